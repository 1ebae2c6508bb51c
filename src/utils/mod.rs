pub mod async_task;
pub mod convert;
pub mod file_io;

#[cfg(test)]
mod async_task_test;
#[cfg(test)]
mod file_io_test;
