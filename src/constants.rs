// -
// Database namespaces

/// Sled tree holding pending transfer entries
pub(crate) const TRANSFER_LOG_TREE: &str = "_transfer_log";

// -
// Store naming

/// Prefix of the local store that backs a cluster store on every member
pub(crate) const LOCAL_STORE_PREFIX: &str = "ls_";
