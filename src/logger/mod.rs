lazy_static! {
    /// Set once from the environment; debug lines are dropped unless it is true
    pub static ref DEBUG_ENABLED: bool = std::env::var("AZURE_PROVISION_DEBUG").map(|v| !v.trim().is_empty()).unwrap_or(false);
}

macro_rules! println_with_time {

    () => { println!(); };
    ($($arg:tt)*) => {
        println!("{} ~ {}", chrono::Local::now().format("%H:%M:%S"), format!($($arg)*))
    }
}

macro_rules! eprintln_with_time {
    ($($arg:tt)*) => {
        eprintln!("{} ~ {}", chrono::Local::now().format("%H:%M:%S"), format!($($arg)*))
    }
}

macro_rules! debug_with_time {
    ($($arg:tt)*) => {
        if *crate::logger::DEBUG_ENABLED {
            println!("{} ~ [debug] {}", chrono::Local::now().format("%H:%M:%S"), format!($($arg)*))
        }
    }
}
