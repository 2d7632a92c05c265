pub mod azure_vm;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// What a successful run leaves behind, also written to last_deployment_summary.yml
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProvisionSummary {
    pub resource_group: String,
    pub location: String,
    pub vm_name: String,
    pub vm_id: String,
    pub nic_id: String,
    pub nsg_id: String,
    pub public_ip_name: String,
    pub public_ip_address: Option<String>,
    pub created_at: String,
}

pub trait ProvisionPipeline {

    /// Creates every resource in order; stops at the first failure
    fn provision(&self) -> Result<ProvisionSummary>;

    /// Removes everything that was provisioned. Returns false if there was nothing to remove.
    fn teardown(&self) -> Result<bool>;

    fn public_ip(&self) -> Result<Option<String>>;

    fn provision_and_record(&self, summary_path: &Path) -> Result<ProvisionSummary> {
        let summary = self.provision()?;
        write_summary(summary_path, &summary)?;
        Ok(summary)
    }

    fn teardown_and_forget(&self, summary_path: &Path) -> Result<bool> {
        let existed = self.teardown()?;
        match fs::remove_file(summary_path) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(existed)
    }
}

pub fn write_summary(path: &Path, summary: &ProvisionSummary) -> Result<()> {
    fs::write(path, serde_yaml::to_string(summary)?)?;
    Ok(())
}

pub fn read_summary(path: &Path) -> Result<ProvisionSummary> {
    Ok(serde_yaml::from_str(&fs::read_to_string(path)?)?)
}
