//! Compiled-program cache keyed by [`ShaderConfig`].

use sha2::{Digest, Sha256};

use crate::shader_assembler::{self, ShaderConfig};

/// Generated program text plus the config it was built from.
#[derive(Clone, Debug)]
pub struct CompiledProgram {
    pub config: ShaderConfig,
    pub source: String,
    /// Hex SHA-256 of `source`.
    pub fingerprint: String,
    /// Increments on every rebuild; GPU pipelines compare against it.
    pub generation: u64,
}

impl CompiledProgram {
    fn assemble(config: ShaderConfig, generation: u64) -> Self {
        let source = shader_assembler::build(&config);
        let fingerprint = fingerprint(&source);
        Self { config, source, fingerprint, generation }
    }
}

/// Hex SHA-256 digest of a string.
pub fn fingerprint(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Rebuilds the program only when the discrete configuration changes.
#[derive(Debug)]
pub struct RebuildGate {
    current: CompiledProgram,
}

impl RebuildGate {
    /// Force the initial build.
    pub fn new(config: ShaderConfig) -> Self {
        let current = CompiledProgram::assemble(config, 0);
        log::info!("Built shader [{}] {}", config, &current.fingerprint[..12]);
        Self { current }
    }

    pub fn current(&self) -> &CompiledProgram {
        &self.current
    }

    /// True when `config` differs by value from the cached one.
    pub fn should_rebuild(&self, config: &ShaderConfig) -> bool {
        self.current.config != *config
    }

    /// Rebuild if needed (or always when `force`). Returns whether a new program was made.
    pub fn rebuild_if_needed(&mut self, config: ShaderConfig, force: bool) -> bool {
        if !force && !self.should_rebuild(&config) {
            return false;
        }
        let next = CompiledProgram::assemble(config, self.current.generation + 1);
        log::info!(
            "Rebuilt shader [{}] {} (generation {})",
            config,
            &next.fingerprint[..12],
            next.generation
        );
        self.current = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_config_is_not_rebuilt() {
        let mut gate = RebuildGate::new(ShaderConfig::default());
        assert!(!gate.rebuild_if_needed(ShaderConfig::default(), false));
        assert_eq!(gate.current().generation, 0);
    }

    #[test]
    fn test_changed_config_rebuilds() {
        let mut gate = RebuildGate::new(ShaderConfig::default());
        let before = gate.current().fingerprint.clone();
        let config = ShaderConfig { shape_type: 10, ..Default::default() };
        assert!(gate.should_rebuild(&config));
        assert!(gate.rebuild_if_needed(config, false));
        assert_eq!(gate.current().generation, 1);
        assert_ne!(gate.current().fingerprint, before);
        assert_eq!(gate.current().config, config);
    }

    #[test]
    fn test_force_bypasses_comparison() {
        let mut gate = RebuildGate::new(ShaderConfig::default());
        let before = gate.current().fingerprint.clone();
        assert!(gate.rebuild_if_needed(ShaderConfig::default(), true));
        assert_eq!(gate.current().generation, 1);
        assert_eq!(gate.current().fingerprint, before);
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = fingerprint("abc");
        assert_eq!(fp, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }
}
