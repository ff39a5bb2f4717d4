//! Lua scripts for the per-game membership lock.
//!
//! The lock is a plain `SET key token NX PX ttl`. Release must only delete
//! the key while it still holds the caller's token, otherwise a holder whose
//! lock expired would free a lock another instance has since taken.

/// Lua script releasing a per-game lock.
///
/// Arguments:
/// - KEYS[1]: Lock key (e.g., `game:{id}:lock`)
/// - ARGV[1]: Holder token returned when the lock was taken
///
/// Returns:
/// - 1: Released
/// - 0: Not held by this token (expired or taken over)
pub const RELEASE_LOCK: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_lock_compares_token() {
        assert!(RELEASE_LOCK.contains("GET"));
        assert!(RELEASE_LOCK.contains("ARGV[1]"));
        assert!(RELEASE_LOCK.contains("DEL"));
    }
}
