use crate::cloud_functions::azure::client::ArmClient;
use crate::cloud_functions::azure::models::*;
use crate::cloud_functions::azure::resources;
use crate::error::{Error, Result};
use crate::pipelines::{ProvisionPipeline, ProvisionSummary};
use crate::utils::files;
use crate::utils::global_config::{DefaultValues, ProvisionConfig};

/// One Linux VM with its own public IP, VNet/subnet, NIC and SSH-only NSG
pub struct AzureVmPipeline<'a> {
    client: &'a ArmClient,
    config: &'a ProvisionConfig,
    defaults: &'a DefaultValues,
}

fn id_of<P>(resource: &Resource<P>, what: &str) -> Result<String> {
    resource.id.clone().ok_or_else(|| Error::Response(format!("{} was returned without an id", what)))
}

impl<'a> AzureVmPipeline<'a> {
    pub fn new(client: &'a ArmClient, config: &'a ProvisionConfig, defaults: &'a DefaultValues) -> Self {
        Self { client, config, defaults }
    }

    fn resource_group_params(&self) -> ResourceGroup {
        ResourceGroup::at(&self.config.location, ResourceGroupProperties::default())
    }

    fn public_ip_params(&self) -> PublicIpAddress {
        let mut ip = PublicIpAddress::at(&self.config.location, PublicIpAddressProperties {
            public_ip_allocation_method: Some(self.defaults.public_ip_allocation),
            ..Default::default()
        });
        ip.sku = Some(Sku { name: self.defaults.public_ip_sku.as_str().to_string() });
        ip
    }

    fn virtual_network_params(&self) -> VirtualNetwork {
        VirtualNetwork::at(&self.config.location, VirtualNetworkProperties {
            address_space: AddressSpace {
                address_prefixes: vec![self.defaults.vnet_address_prefix.to_string()],
            },
            subnets: vec![Subnet::named(&self.config.subnet_name, SubnetProperties {
                address_prefix: Some(self.defaults.subnet_address_prefix.to_string()),
                ..Default::default()
            })],
            ..Default::default()
        })
    }

    fn network_interface_params(&self, subnet_id: &str, public_ip_id: &str, nsg_id: Option<&str>) -> NetworkInterface {
        NetworkInterface::at(&self.config.location, NetworkInterfaceProperties {
            ip_configurations: vec![IpConfiguration::named(&self.config.ip_config_name(), IpConfigurationProperties {
                subnet: Some(SubResource::new(subnet_id)),
                public_ip_address: Some(SubResource::new(public_ip_id)),
                private_ip_allocation_method: Some(IpAllocationMethod::Dynamic),
            })],
            network_security_group: nsg_id.map(SubResource::new),
            ..Default::default()
        })
    }

    fn virtual_machine_params(&self, nic_id: &str, ssh_key: &str, custom_data: Option<String>) -> VirtualMachine {
        VirtualMachine::at(&self.config.location, VirtualMachineProperties {
            hardware_profile: Some(HardwareProfile { vm_size: self.defaults.vm_size.clone() }),
            storage_profile: Some(StorageProfile {
                image_reference: Some(self.defaults.image.to_reference()),
                os_disk: Some(OsDisk {
                    name: Some(self.config.disk_name.clone()),
                    create_option: DiskCreateOption::FromImage,
                }),
            }),
            os_profile: Some(OsProfile {
                computer_name: self.config.vm_name.clone(),
                admin_username: self.config.admin_username.clone(),
                custom_data,
                linux_configuration: Some(LinuxConfiguration {
                    disable_password_authentication: true,
                    ssh: Some(SshConfiguration {
                        public_keys: vec![SshPublicKey {
                            path: self.config.authorized_keys_path(),
                            key_data: ssh_key.to_string(),
                        }],
                    }),
                }),
            }),
            network_profile: Some(NetworkProfile {
                network_interfaces: vec![SubResource::new(nic_id)],
            }),
            ..Default::default()
        })
    }

    fn network_security_group_params(&self) -> NetworkSecurityGroup {
        let rule = &self.defaults.ssh_rule;
        NetworkSecurityGroup::at(&self.config.location, NetworkSecurityGroupProperties {
            security_rules: vec![SecurityRule::named(&rule.name, SecurityRuleProperties {
                protocol: SecurityRuleProtocol::Tcp,
                direction: SecurityRuleDirection::Inbound,
                access: SecurityRuleAccess::Allow,
                priority: rule.priority,
                source_address_prefix: rule.source_address_prefix.clone(),
                source_port_range: "*".to_string(),
                destination_address_prefix: "*".to_string(),
                destination_port_range: rule.port.to_string(),
            })],
            ..Default::default()
        })
    }
}

impl<'a> ProvisionPipeline for AzureVmPipeline<'a> {

    fn provision(&self) -> Result<ProvisionSummary> {
        let config = self.config;
        let rg = config.resource_group.as_str();

        // Local inputs first so a bad key path fails before anything is created
        let ssh_key = files::read_ssh_public_key(&config.ssh_key_path)?;
        let custom_data = match &config.custom_data_path {
            Some(path) => Some(files::read_custom_data(path)?),
            None => None,
        };

        println_with_time!("Creating or updating resource group '{}' in {}...", rg, config.location);
        resources::create_or_update_resource_group(self.client, rg, &self.resource_group_params())?;

        println_with_time!("Creating public IP '{}'...", config.ip_name);
        let public_ip = resources::create_or_update_public_ip(self.client, rg, &config.ip_name, &self.public_ip_params())?;
        let public_ip_id = id_of(&public_ip, "public IP")?;

        println_with_time!("Creating VNet '{}' and subnet '{}'...", config.vnet_name, config.subnet_name);
        resources::create_or_update_virtual_network(self.client, rg, &config.vnet_name, &self.virtual_network_params())?;
        let subnet = resources::get_subnet(self.client, rg, &config.vnet_name, &config.subnet_name)?;
        let subnet_id = id_of(&subnet, "subnet")?;

        println_with_time!("Creating NIC '{}'...", config.nic_name);
        let nic = resources::create_or_update_network_interface(self.client, rg, &config.nic_name,
            &self.network_interface_params(&subnet_id, &public_ip_id, None))?;
        let nic_id = id_of(&nic, "network interface")?;

        println_with_time!("Creating virtual machine '{}' ({})...", config.vm_name, self.defaults.vm_size);
        let vm = resources::create_or_update_virtual_machine(self.client, rg, &config.vm_name,
            &self.virtual_machine_params(&nic_id, &ssh_key, custom_data))?;
        let vm_name = vm.name.clone().unwrap_or_else(|| config.vm_name.clone());
        println_with_time!("VM created: {}", vm_name);

        let nsg_name = config.nsg_name();
        println_with_time!("Creating network security group '{}' allowing SSH on port {}...", nsg_name, self.defaults.ssh_rule.port);
        let nsg = resources::create_or_update_network_security_group(self.client, rg, &nsg_name, &self.network_security_group_params())?;
        let nsg_id = id_of(&nsg, "network security group")?;

        println_with_time!("Attaching '{}' to NIC '{}'...", nsg_name, config.nic_name);
        let nic = resources::create_or_update_network_interface(self.client, rg, &config.nic_name,
            &self.network_interface_params(&subnet_id, &public_ip_id, Some(&nsg_id)))?;

        // Dynamic addresses are only assigned once the IP is attached to a running VM
        let public_ip_address = self.public_ip()?;
        match &public_ip_address {
            Some(address) => println_with_time!("Public IP of the VM: {}", address),
            None => eprintln_with_time!("Warning: public IP '{}' has no address assigned yet", config.ip_name),
        }

        Ok(ProvisionSummary {
            resource_group: rg.to_string(),
            location: config.location.clone(),
            vm_name,
            vm_id: id_of(&vm, "virtual machine")?,
            nic_id: id_of(&nic, "network interface")?,
            nsg_id,
            public_ip_name: config.ip_name.clone(),
            public_ip_address,
            created_at: chrono::Local::now().to_rfc3339(),
        })
    }

    fn teardown(&self) -> Result<bool> {
        println_with_time!("Deleting resource group '{}'\nThis may take a while...", self.config.resource_group);
        let existed = resources::delete_resource_group(self.client, &self.config.resource_group)?;
        if existed {
            println_with_time!("Resource group '{}' deleted", self.config.resource_group);
        } else {
            println_with_time!("Resource group '{}' does not exist, nothing to delete", self.config.resource_group);
        }
        Ok(existed)
    }

    fn public_ip(&self) -> Result<Option<String>> {
        let ip = resources::get_public_ip(self.client, &self.config.resource_group, &self.config.ip_name)?;
        Ok(ip.properties.ip_address)
    }
}
