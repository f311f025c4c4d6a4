use std::net::IpAddr;

/// Whether `address` names this machine.
pub fn is_local_host(address: &str) -> bool {
    let address = address.trim_start_matches('[').trim_end_matches(']');
    if address.eq_ignore_ascii_case("localhost") {
        return true;
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return ip.is_loopback();
    }

    match hostname::get() {
        Ok(name) => {
            let name = name.to_string_lossy();
            let short = name.split('.').next().unwrap_or_default();
            address.eq_ignore_ascii_case(&name) || address.eq_ignore_ascii_case(short)
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_names_are_local() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("127.0.0.1"));
        assert!(is_local_host("::1"));
        assert!(is_local_host("[::1]"));
        assert!(!is_local_host("10.1.2.3"));
        assert!(!is_local_host("proj5.example.invalid"));
    }

    #[test]
    fn own_hostname_is_local() {
        let name = hostname::get().unwrap();
        assert!(is_local_host(&name.to_string_lossy()));
    }
}
