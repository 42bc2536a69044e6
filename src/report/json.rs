use anyhow::{Context, Result};
use std::path::Path;

use crate::harness::BenchmarkRun;

/// Writes the full result set as pretty JSON. This dump is what the `report`
/// subcommand reads back to regenerate the markdown.
pub fn write(run: &BenchmarkRun, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(run)?;
    std::fs::write(path, json).with_context(|| format!("falha ao gravar {}", path.display()))?;
    println!("✅ JSON salvo em:      {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::CacheMode;

    #[test]
    fn test_round_trips_through_dump() {
        let run = BenchmarkRun {
            generated_at: "28/08/2026 10:00:00".to_string(),
            env: "TST".to_string(),
            session_id: "abc".to_string(),
            cache_mode: CacheMode::SharedContext,
            v1: vec![],
            v2: vec![],
        };
        let dir = std::env::temp_dir().join(format!("ra-tester-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dump.json");

        write(&run, &path).unwrap();
        let loaded: BenchmarkRun =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.session_id, "abc");
        assert_eq!(loaded.cache_mode, CacheMode::SharedContext);

        std::fs::remove_dir_all(&dir).ok();
    }
}
