use crate::error::{Error, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref RE_OPENSSH_KEY: Regex = Regex::new(r"^(ssh-(rsa|ed25519|dss)|ecdsa-sha2-nistp(256|384|521)|sk-(ssh-ed25519|ecdsa-sha2-nistp256)@openssh\.com) [A-Za-z0-9+/=]+( .*)?$").unwrap();
}

/// Replaces a leading `~` with the home directory, like a shell would
pub fn expand_home<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = home::home_dir().ok_or_else(|| Error::Config(format!("cannot expand {}: no home directory", path.display())))?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

/// Reads an OpenSSH public key (single line) and checks its shape
pub fn read_ssh_public_key<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let key = fs::read_to_string(path).map_err(|e| Error::Config(format!("could not read SSH public key {}: {}", path.display(), e)))?;
    let key = key.trim();
    if !RE_OPENSSH_KEY.is_match(key) {
        return Err(Error::Config(format!("{} does not look like an OpenSSH public key (is it the private key?)", path.display())));
    }
    Ok(key.to_string())
}

/// Reads a cloud-init file and encodes it the way `osProfile.customData` expects
pub fn read_custom_data<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let raw = fs::read(path).map_err(|e| Error::Config(format!("could not read custom data {}: {}", path.display(), e)))?;
    Ok(base64::encode(&raw))
}
