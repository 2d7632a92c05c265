//main.rs
//Provisions a single Azure Linux VM and the network around it.

// =========== Libraries =============
#[macro_use]
extern crate lazy_static;

// ========== General Data ===========
#[macro_use]
mod logger;
#[macro_use]
mod utils;
mod error;
mod paths;
mod shell_tools;
// ========= Cloud Specific ==========
mod cloud_functions;
mod pipelines;

use cloud_functions::azure::client::ArmClient;
use cloud_functions::azure::credential::DefaultCredential;
use cloud_functions::ReqwestTransport;
use error::{Error, Result};
use pipelines::azure_vm::AzureVmPipeline;
use pipelines::ProvisionPipeline;
use std::env;
use std::path::Path;
use utils::global_config::{self, DefaultValues, ProvisionConfig};

const USAGE: &str = "Usage: vm-provisioner [COMMAND]

Commands:
    create      create the VM and its network (default)
    delete      delete the whole resource group
    ip          print the public IP address of the VM
    help        print this message

Configuration is read from var.env (or $AZURE_ENV_FILE) and config/defaults.yml (or $AZURE_DEFAULTS_FILE).";

enum Action {
    Provision,
    Teardown,
    ShowIp,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let action = match args.get(1).map(|a| a.to_lowercase()) {
        None => Action::Provision,
        Some(arg) => match arg.as_ref() {
            "create" | "provision" | "up" => Action::Provision,
            "delete" | "remove" | "clean" | "rm" | "del" => Action::Teardown,
            "ip" | "show" => Action::ShowIp,
            "help" | "-h" | "--help" => {
                println!("{}", USAGE);
                return;
            }
            _ => {
                eprintln!("Unknown command '{}'\n\n{}", arg, USAGE);
                std::process::exit(2);
            }
        },
    };

    if let Err(e) = run(action) {
        eprintln_with_time!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(action: Action) -> Result<()> {
    match global_config::load_env_file()? {
        Some(path) => debug_with_time!("Loaded environment from {}", path.display()),
        None => debug_with_time!("No env file found, using the process environment only"),
    }

    let config = ProvisionConfig::from_env()?;
    config.validate()?;
    let defaults: DefaultValues = global_config::load_default_values(&global_config::default_values_path())?;
    defaults.validate()?;

    let credential = DefaultCredential::from_lookup(|k| env::var(k).ok(), &defaults.azure_cli_binary, &defaults.shell)?;
    let client = ArmClient::new(
        Box::new(ReqwestTransport::new()?),
        Box::new(credential),
        &config.subscription_id,
        defaults.poll_options(),
    );
    let pipeline = AzureVmPipeline::new(&client, &config, &defaults);
    let summary_path = Path::new(paths::LAST_SUMMARY);

    match action {
        Action::Provision => {
            let summary = pipeline.provision_and_record(summary_path)?;
            println_with_time!("Done: VM '{}' in resource group '{}'", summary.vm_name, summary.resource_group);
            if let Some(ip) = &summary.public_ip_address {
                println_with_time!("Connect with: ssh {}@{}", config.admin_username, ip);
            }
            println_with_time!("Summary written to {}", summary_path.display());
        }
        Action::Teardown => {
            pipeline.teardown_and_forget(summary_path)?;
        }
        Action::ShowIp => {
            if let Ok(last) = pipelines::read_summary(summary_path) {
                debug_with_time!("Last deployment: '{}' created at {}", last.vm_name, last.created_at);
            }
            match pipeline.public_ip() {
                Ok(Some(ip)) => println!("{}", ip),
                Ok(None) => eprintln_with_time!("Public IP '{}' has no address assigned", config.ip_name),
                Err(ref e) if e.is_not_found() => {
                    return Err(Error::Config(format!("public IP '{}' does not exist in '{}', run 'create' first", config.ip_name, config.resource_group)));
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}
