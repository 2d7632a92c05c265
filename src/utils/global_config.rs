// global_config.rs
//
// Everything a run is parameterised with. Per-deployment values (names,
// subscription, key path) come from the environment, usually via var.env.
// Values that rarely change (VM size, image, address ranges, the SSH rule)
// come from config/defaults.yml, with built-in fallbacks for every key.

use crate::cloud_functions::azure::models::{ImageReference, IpAllocationMethod, PublicIpSku};
use crate::cloud_functions::azure::poller::PollOptions;
use crate::error::{Error, Result};
use crate::paths;
use crate::utils::files;
use crate::utils::names::{self, NameKind};
use crate::utils::types::CidrIP;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ======== Defaults file ==========

mod fallback {
    use super::*;

    make_default!(
        vm_size ~ String = "Standard_B1s",
        public_ip_sku ~ PublicIpSku = PublicIpSku::Standard,
        public_ip_allocation ~ IpAllocationMethod = IpAllocationMethod::Static,
        image_publisher ~ String = "Canonical",
        image_offer ~ String = "0001-com-ubuntu-server-jammy",
        image_sku ~ String = "22_04-lts-gen2",
        image_version ~ String = "latest",
        ssh_rule_name ~ String = "Allow-SSH",
        ssh_rule_priority ~ u16 = 1000u16,
        ssh_rule_port ~ u16 = 22u16,
        ssh_rule_source ~ String = "*",
        poll_interval_secs ~ u64 = 5u64,
        operation_timeout_secs ~ u64 = 1800u64,
        azure_cli_binary ~ String = "az",
        shell ~ String = "sh"
    );


    pub fn vnet_address_prefix() -> CidrIP {
        CidrIP { ip: Ipv4Addr::new(10, 0, 0, 0), netmask: 16 }
    }

    pub fn subnet_address_prefix() -> CidrIP {
        CidrIP { ip: Ipv4Addr::new(10, 0, 0, 0), netmask: 24 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Marketplace image the OS disk is created from
pub struct ImageDefaults {
    #[serde(default = "fallback::image_publisher")]
    pub publisher: String,
    #[serde(default = "fallback::image_offer")]
    pub offer: String,
    #[serde(default = "fallback::image_sku")]
    pub sku: String,
    #[serde(default = "fallback::image_version")]
    pub version: String,
}

impl Default for ImageDefaults {
    fn default() -> Self {
        Self {
            publisher: fallback::image_publisher(),
            offer: fallback::image_offer(),
            sku: fallback::image_sku(),
            version: fallback::image_version(),
        }
    }
}

impl ImageDefaults {
    pub fn to_reference(&self) -> ImageReference {
        ImageReference {
            publisher: self.publisher.clone(),
            offer: self.offer.clone(),
            sku: self.sku.clone(),
            version: self.version.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Inbound rule opened on the VM's NSG
pub struct SshRule {
    #[serde(default = "fallback::ssh_rule_name")]
    pub name: String,
    #[serde(default = "fallback::ssh_rule_priority")]
    pub priority: u16,
    #[serde(default = "fallback::ssh_rule_port")]
    pub port: u16,
    #[serde(default = "fallback::ssh_rule_source")]
    pub source_address_prefix: String,
}

impl Default for SshRule {
    fn default() -> Self {
        Self {
            name: fallback::ssh_rule_name(),
            priority: fallback::ssh_rule_priority(),
            port: fallback::ssh_rule_port(),
            source_address_prefix: fallback::ssh_rule_source(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// All the values a user may tune without touching var.env
pub struct DefaultValues {
    #[serde(default = "fallback::vm_size")]
    pub vm_size: String,
    #[serde(default)]
    pub image: ImageDefaults,

    #[serde(default = "fallback::vnet_address_prefix")]
    pub vnet_address_prefix: CidrIP,
    #[serde(default = "fallback::subnet_address_prefix")]
    pub subnet_address_prefix: CidrIP,
    #[serde(default = "fallback::public_ip_sku")]
    pub public_ip_sku: PublicIpSku,
    #[serde(default = "fallback::public_ip_allocation")]
    pub public_ip_allocation: IpAllocationMethod,
    #[serde(default)]
    pub ssh_rule: SshRule,

    #[serde(default = "fallback::poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "fallback::operation_timeout_secs")]
    pub operation_timeout_secs: u64,
    #[serde(default = "fallback::azure_cli_binary")]
    pub azure_cli_binary: String,
    #[serde(default = "fallback::shell")]
    pub shell: String,
}

impl Default for DefaultValues {
    fn default() -> Self {
        Self {
            vm_size: fallback::vm_size(),
            image: ImageDefaults::default(),
            vnet_address_prefix: fallback::vnet_address_prefix(),
            subnet_address_prefix: fallback::subnet_address_prefix(),
            public_ip_sku: fallback::public_ip_sku(),
            public_ip_allocation: fallback::public_ip_allocation(),
            ssh_rule: SshRule::default(),
            poll_interval_secs: fallback::poll_interval_secs(),
            operation_timeout_secs: fallback::operation_timeout_secs(),
            azure_cli_binary: fallback::azure_cli_binary(),
            shell: fallback::shell(),
        }
    }
}

impl DefaultValues {
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.operation_timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.vnet_address_prefix.contains(&self.subnet_address_prefix) {
            return Err(Error::Cidr(format!("subnet {} is not inside the virtual network {}", self.subnet_address_prefix, self.vnet_address_prefix)));
        }
        if !within_bounds_incl!(100, self.ssh_rule.priority, 4096) {
            return Err(Error::Config(format!("ssh_rule.priority must be between 100 and 4096, got {}", self.ssh_rule.priority)));
        }
        if self.ssh_rule.port == 0 {
            return Err(Error::Config("ssh_rule.port cannot be 0".to_string()));
        }
        names::validate_name(NameKind::Network, "ssh_rule.name", &self.ssh_rule.name)?;
        if self.public_ip_sku == PublicIpSku::Standard && self.public_ip_allocation != IpAllocationMethod::Static {
            return Err(Error::Config("a Standard public IP needs public_ip_allocation: Static".to_string()));
        }
        if self.vm_size.trim().is_empty() {
            return Err(Error::Config("vm_size cannot be empty".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs cannot be 0".to_string()));
        }
        if self.operation_timeout_secs == 0 {
            return Err(Error::Config("operation_timeout_secs cannot be 0".to_string()));
        }
        Ok(())
    }
}

/// Reads the defaults file; a missing file means built-in defaults
pub fn load_default_values(path: &Path) -> Result<DefaultValues> {
    match fs::read_to_string(path) {
        Ok(text) => DefaultValues::from_yaml(&text)
            .map_err(|e| Error::Config(format!("could not parse {}: {}", path.display(), e))),
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
            debug_with_time!("No defaults file at {}, using built-in defaults", path.display());
            Ok(DefaultValues::default())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn default_values_path() -> PathBuf {
    std::env::var(paths::DEFAULT_VALUES_VAR).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(paths::DEFAULT_VALUES))
}

// ========== Environment ==========

/// Loads var.env (or $AZURE_ENV_FILE) into the process environment.
/// Returns the file used, None if there was none.
pub fn load_env_file() -> Result<Option<PathBuf>> {
    let path = std::env::var(paths::ENV_FILE_VAR).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(paths::ENV_FILE));
    load_env_file_at(&path)
}

/// Variables already exported keep their value
pub fn load_env_file_at(path: &Path) -> Result<Option<PathBuf>> {
    match dotenv::from_path(path) {
        Ok(()) => Ok(Some(path.to_path_buf())),
        Err(dotenv::Error::Io(ref e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Per-deployment parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionConfig {
    pub subscription_id: String,
    pub location: String,
    pub resource_group: String,
    pub vm_name: String,
    pub admin_username: String,
    pub ssh_key_path: PathBuf,
    pub vnet_name: String,
    pub subnet_name: String,
    pub nic_name: String,
    pub ip_name: String,
    pub disk_name: String,
    pub custom_data_path: Option<PathBuf>,
}

pub const REQUIRED_VARS: [&str; 11] = [
    "AZURE_SUBSCRIPTION_ID",
    "AZURE_LOCATION",
    "AZURE_RESOURCE_GROUP",
    "AZURE_VM_NAME",
    "AZURE_ADMIN_USERNAME",
    "AZURE_SSH_KEY_PATH",
    "AZURE_VNET_NAME",
    "AZURE_SUBNET_NAME",
    "AZURE_NIC_NAME",
    "AZURE_IP_NAME",
    "AZURE_DISK_NAME",
];

impl ProvisionConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Builds the config from any key/value source; every missing variable is
    /// reported in a single error
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
        where F: Fn(&str) -> Option<String> {

        let value = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let missing: Vec<&str> = REQUIRED_VARS.iter().cloned().filter(|k| value(k).is_none()).collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!("missing environment variables: {}", missing.join(", "))));
        }
        let get = |k: &str| value(k).unwrap_or_default();

        Ok(Self {
            subscription_id: get("AZURE_SUBSCRIPTION_ID"),
            location: get("AZURE_LOCATION"),
            resource_group: get("AZURE_RESOURCE_GROUP"),
            vm_name: get("AZURE_VM_NAME"),
            admin_username: get("AZURE_ADMIN_USERNAME"),
            ssh_key_path: files::expand_home(get("AZURE_SSH_KEY_PATH"))?,
            vnet_name: get("AZURE_VNET_NAME"),
            subnet_name: get("AZURE_SUBNET_NAME"),
            nic_name: get("AZURE_NIC_NAME"),
            ip_name: get("AZURE_IP_NAME"),
            disk_name: get("AZURE_DISK_NAME"),
            custom_data_path: match value("AZURE_CUSTOM_DATA_PATH") {
                Some(p) => Some(files::expand_home(p)?),
                None => None,
            },
        })
    }

    pub fn nsg_name(&self) -> String {
        format!("{}-nsg", self.vm_name)
    }

    pub fn ip_config_name(&self) -> String {
        format!("{}-ipconfig", self.nic_name)
    }

    pub fn authorized_keys_path(&self) -> String {
        format!("/home/{}/.ssh/authorized_keys", self.admin_username)
    }

    /// Name checks only; files are read when provisioning starts
    pub fn validate(&self) -> Result<()> {
        names::validate_subscription_id(&self.subscription_id)?;
        names::validate_location(&self.location)?;
        names::validate_name(NameKind::ResourceGroup, "AZURE_RESOURCE_GROUP", &self.resource_group)?;
        names::validate_name(NameKind::VirtualMachine, "AZURE_VM_NAME", &self.vm_name)?;
        names::validate_admin_username(&self.admin_username)?;
        names::validate_name(NameKind::Network, "AZURE_VNET_NAME", &self.vnet_name)?;
        names::validate_name(NameKind::Network, "AZURE_SUBNET_NAME", &self.subnet_name)?;
        names::validate_name(NameKind::Network, "AZURE_NIC_NAME", &self.nic_name)?;
        names::validate_name(NameKind::Network, "AZURE_IP_NAME", &self.ip_name)?;
        names::validate_name(NameKind::Network, "AZURE_DISK_NAME", &self.disk_name)?;
        names::validate_name(NameKind::Network, "NSG name", &self.nsg_name())?;
        names::validate_name(NameKind::Network, "NIC ip configuration name", &self.ip_config_name())?;
        Ok(())
    }
}
