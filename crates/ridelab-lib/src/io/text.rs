use anyhow::{Context, Result};
use std::path::Path;

/// Parse newline-delimited samples, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not a number: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a newline-delimited series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blanks() {
        let parsed = parse_f64_series("# rr ms\n812\n\n  798.5 \n").unwrap();
        assert_eq!(parsed, vec![812.0, 798.5]);
    }

    #[test]
    fn reports_offending_line() {
        let err = parse_f64_series("800\nabc\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        assert!(parse_f64_series("# nothing\n").is_err());
    }
}
