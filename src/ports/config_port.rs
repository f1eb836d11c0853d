//! Configuration access port trait.

use std::time::Duration;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Whole seconds, clamped at zero.
    fn get_secs(&self, section: &str, key: &str, default_secs: u64) -> Duration {
        let secs = self.get_int(section, key, default_secs as i64).max(0) as u64;
        Duration::from_secs(secs)
    }
}
