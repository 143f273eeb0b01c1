include!(concat!(env!("OUT_DIR"), "/version.rs"));
