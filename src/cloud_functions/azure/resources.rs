// Typed create/get/delete calls for each resource type the pipeline touches.
use super::client::ArmClient;
use super::models::{
    NetworkInterface, NetworkSecurityGroup, PublicIpAddress, ResourceGroup, Subnet, VirtualMachine, VirtualNetwork,
};
use crate::error::Result;

pub const RESOURCES_API_VERSION: &str = "2021-04-01";
pub const NETWORK_API_VERSION: &str = "2023-09-01";
pub const COMPUTE_API_VERSION: &str = "2023-09-01";

pub fn resource_group_path(subscription_id: &str, resource_group: &str) -> String {
    format!("/subscriptions/{}/resourcegroups/{}", subscription_id, resource_group)
}

/// `/subscriptions/../resourceGroups/../providers/<namespace>/<kind>/<name>`
pub fn provider_path(subscription_id: &str, resource_group: &str, namespace: &str, kind: &str, name: &str) -> String {
    format!("/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}", subscription_id, resource_group, namespace, kind, name)
}

fn network_path(client: &ArmClient, resource_group: &str, kind: &str, name: &str) -> String {
    provider_path(client.subscription_id(), resource_group, "Microsoft.Network", kind, name)
}

fn compute_path(client: &ArmClient, resource_group: &str, kind: &str, name: &str) -> String {
    provider_path(client.subscription_id(), resource_group, "Microsoft.Compute", kind, name)
}

// ============ Resource groups ============

pub fn create_or_update_resource_group(client: &ArmClient, name: &str, params: &ResourceGroup) -> Result<ResourceGroup> {
    client.create_or_update(&resource_group_path(client.subscription_id(), name), RESOURCES_API_VERSION, params)
}

/// Deletes the group and everything in it; false if it did not exist
pub fn delete_resource_group(client: &ArmClient, name: &str) -> Result<bool> {
    client.delete(&resource_group_path(client.subscription_id(), name), RESOURCES_API_VERSION)
}

// =============== Network =================

pub fn create_or_update_public_ip(client: &ArmClient, resource_group: &str, name: &str, params: &PublicIpAddress) -> Result<PublicIpAddress> {
    client.create_or_update(&network_path(client, resource_group, "publicIPAddresses", name), NETWORK_API_VERSION, params)
}

pub fn get_public_ip(client: &ArmClient, resource_group: &str, name: &str) -> Result<PublicIpAddress> {
    client.get(&network_path(client, resource_group, "publicIPAddresses", name), NETWORK_API_VERSION)
}

pub fn create_or_update_virtual_network(client: &ArmClient, resource_group: &str, name: &str, params: &VirtualNetwork) -> Result<VirtualNetwork> {
    client.create_or_update(&network_path(client, resource_group, "virtualNetworks", name), NETWORK_API_VERSION, params)
}

pub fn get_subnet(client: &ArmClient, resource_group: &str, vnet_name: &str, subnet_name: &str) -> Result<Subnet> {
    let path = format!("{}/subnets/{}", network_path(client, resource_group, "virtualNetworks", vnet_name), subnet_name);
    client.get(&path, NETWORK_API_VERSION)
}

pub fn create_or_update_network_interface(client: &ArmClient, resource_group: &str, name: &str, params: &NetworkInterface) -> Result<NetworkInterface> {
    client.create_or_update(&network_path(client, resource_group, "networkInterfaces", name), NETWORK_API_VERSION, params)
}

pub fn create_or_update_network_security_group(client: &ArmClient, resource_group: &str, name: &str, params: &NetworkSecurityGroup) -> Result<NetworkSecurityGroup> {
    client.create_or_update(&network_path(client, resource_group, "networkSecurityGroups", name), NETWORK_API_VERSION, params)
}

// =============== Compute =================

pub fn create_or_update_virtual_machine(client: &ArmClient, resource_group: &str, name: &str, params: &VirtualMachine) -> Result<VirtualMachine> {
    client.create_or_update(&compute_path(client, resource_group, "virtualMachines", name), COMPUTE_API_VERSION, params)
}
