//! Byte count formatting

/// Format a byte count with SI (powers of 1000) units, e.g. `1.5 MB`.
pub fn byte_count_si(bytes: u64) -> String {
    const UNIT: u64 = 1000;
    const PREFIXES: [char; 6] = ['k', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_count_si() {
        assert_eq!(byte_count_si(0), "0 B");
        assert_eq!(byte_count_si(999), "999 B");
        assert_eq!(byte_count_si(1000), "1.0 kB");
        assert_eq!(byte_count_si(1536), "1.5 kB");
        assert_eq!(byte_count_si(2_500_000), "2.5 MB");
        assert_eq!(byte_count_si(589_900_000_000_000), "589.9 TB");
    }
}
