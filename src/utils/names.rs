// Azure naming rules for the resources this tool creates.
// Checked up front so a typo in var.env fails before anything is created.
use crate::error::{Error, Result};
use regex::Regex;

lazy_static! {
    static ref RE_SUBSCRIPTION: Regex = Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").unwrap();
    static ref RE_LOCATION: Regex = Regex::new(r"^[a-z0-9]+$").unwrap();
    static ref RE_RESOURCE_GROUP: Regex = Regex::new(r"^[-\w.()]{1,90}$").unwrap();
    static ref RE_VM: Regex = Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,62}[a-zA-Z0-9])?$").unwrap();
    static ref RE_NETWORK: Regex = Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9._-]{0,78}[a-zA-Z0-9_])?$").unwrap();
    static ref RE_LINUX_USER: Regex = Regex::new(r"^[a-z_][a-z0-9_-]{0,63}$").unwrap();
}

/// Admin names Azure refuses for Linux VMs
const RESERVED_USERNAMES: &[&str] = &[
    "administrator", "admin", "user", "user1", "test", "user2", "test1", "user3",
    "admin1", "1", "123", "a", "actuser", "adm", "admin2", "aspnet", "backup",
    "console", "david", "guest", "john", "owner", "root", "server", "sql",
    "support", "support_388945a0", "sys", "test2", "test3", "user4", "user5",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NameKind {
    ResourceGroup,
    VirtualMachine,
    /// VNet, subnet, NIC, public IP, NSG and managed disk share one rule
    Network,
}

pub fn validate_name(kind: NameKind, what: &str, name: &str) -> Result<()> {
    let ok = match kind {
        NameKind::ResourceGroup => RE_RESOURCE_GROUP.is_match(name) && !name.ends_with('.'),
        NameKind::VirtualMachine => RE_VM.is_match(name),
        NameKind::Network => RE_NETWORK.is_match(name),
    };
    if ok {
        Ok(())
    } else {
        let rule = match kind {
            NameKind::ResourceGroup => "1-90 letters, digits, '-', '_', '.', '(' or ')', not ending with '.'",
            NameKind::VirtualMachine => "1-64 letters, digits or '-', starting and ending with a letter or digit",
            NameKind::Network => "1-80 letters, digits, '.', '_' or '-', starting with a letter or digit and ending with a letter, digit or '_'",
        };
        Err(Error::InvalidName(format!("{} '{}' must be {}", what, name, rule)))
    }
}

pub fn validate_subscription_id(id: &str) -> Result<()> {
    if RE_SUBSCRIPTION.is_match(id) {
        Ok(())
    } else {
        Err(Error::InvalidName(format!("subscription id '{}' is not a GUID", id)))
    }
}

pub fn validate_location(location: &str) -> Result<()> {
    if RE_LOCATION.is_match(location) {
        Ok(())
    } else {
        Err(Error::InvalidName(format!("location '{}' must be a lower-case region name such as 'eastus'", location)))
    }
}

pub fn validate_admin_username(name: &str) -> Result<()> {
    if !RE_LINUX_USER.is_match(name) {
        return Err(Error::InvalidName(format!("admin username '{}' is not a valid Linux user name", name)));
    }
    if RESERVED_USERNAMES.contains(&name) {
        return Err(Error::InvalidName(format!("admin username '{}' is reserved by Azure", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_group_names() {
        assert!(validate_name(NameKind::ResourceGroup, "rg", "my-rg_1.(prod)").is_ok());
        assert!(validate_name(NameKind::ResourceGroup, "rg", "trailing.").is_err());
        assert!(validate_name(NameKind::ResourceGroup, "rg", "").is_err());
        assert!(validate_name(NameKind::ResourceGroup, "rg", "has space").is_err());
        assert!(validate_name(NameKind::ResourceGroup, "rg", &"r".repeat(91)).is_err());
    }

    #[test]
    fn vm_names() {
        assert!(validate_name(NameKind::VirtualMachine, "vm", "web-01").is_ok());
        assert!(validate_name(NameKind::VirtualMachine, "vm", "a").is_ok());
        assert!(validate_name(NameKind::VirtualMachine, "vm", "-web").is_err());
        assert!(validate_name(NameKind::VirtualMachine, "vm", "web-").is_err());
        assert!(validate_name(NameKind::VirtualMachine, "vm", "web_01").is_err());
        assert!(validate_name(NameKind::VirtualMachine, "vm", &"v".repeat(65)).is_err());
    }

    #[test]
    fn network_names() {
        assert!(validate_name(NameKind::Network, "nic", "vm-nic").is_ok());
        assert!(validate_name(NameKind::Network, "nic", "vm.nic_").is_ok());
        assert!(validate_name(NameKind::Network, "nic", "_nic").is_err());
        assert!(validate_name(NameKind::Network, "nic", "nic.").is_err());
        assert!(validate_name(NameKind::Network, "nic", &"n".repeat(81)).is_err());
    }

    #[test]
    fn error_mentions_the_field() {
        let err = validate_name(NameKind::Network, "AZURE_NIC_NAME", "bad name").unwrap_err();
        assert!(err.to_string().contains("AZURE_NIC_NAME"));
        assert!(err.to_string().contains("bad name"));
    }

    #[test]
    fn subscription_and_location() {
        assert!(validate_subscription_id("00000000-1111-2222-3333-444444444444").is_ok());
        assert!(validate_subscription_id("not-a-guid").is_err());
        assert!(validate_location("westeurope").is_ok());
        assert!(validate_location("West Europe").is_err());
    }

    #[test]
    fn admin_usernames() {
        assert!(validate_admin_username("azureuser").is_ok());
        assert!(validate_admin_username("root").is_err());
        assert!(validate_admin_username("admin").is_err());
        assert!(validate_admin_username("Azure").is_err());
        assert!(validate_admin_username("1user").is_err());
    }
}
