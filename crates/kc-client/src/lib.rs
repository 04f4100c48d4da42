//! kc-client: collaborators consumed by the kc-wizard engine
//!
//! Version matrices, the component catalog, the node/registry inventory and
//! the persistence store. Each collaborator is a trait with a file-backed
//! implementation, plus an in-memory one for embedding and tests.

pub mod components;
pub mod error;
pub mod inventory;
pub mod store;
pub mod versions;

pub use components::{
    Component, ComponentCategory, ComponentSchema, ComponentSource, FileComponentSource,
    PropertySchema, find_component,
};
pub use error::ClientError;
pub use inventory::{BackupPoint, FileInventorySource, Inventory, InventorySource, NodeInfo, Registry};
pub use store::{ClusterStore, Document, FileStore, MemoryStore};
pub use versions::{
    FileVersionSource, ImageMode, KubernetesRelease, VersionControl, VersionControlItem,
    VersionMatrix, VersionSource, parse_version_matrix,
};

use std::path::{Path, PathBuf};

/// Directory name under the home directory holding kc-wizard settings
const CONFIG_DIR: &str = ".kc-wizard";

/// Default location of the wizard config file (`~/.kc-wizard/config.yaml`)
pub fn default_config_path() -> Result<PathBuf, ClientError> {
    let home = dirs_next::home_dir().ok_or(ClientError::NoHomeDirectory)?;
    Ok(home.join(CONFIG_DIR).join("config.yaml"))
}

/// Read a collaborator document, mapping a missing file to `NotFound`
pub(crate) async fn read_document(path: &Path) -> Result<String, ClientError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ClientError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(ClientError::Io(e)),
    }
}
