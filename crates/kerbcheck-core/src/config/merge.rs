//! Configuration layer merging logic
//!
//! Project values replace global values field by field.

use super::schema::KerbcheckConfig;

/// Merge the global and project layers.
pub fn merge_configs(
    global: Option<KerbcheckConfig>,
    project: Option<KerbcheckConfig>,
) -> KerbcheckConfig {
    let mut merged = global.unwrap_or_default();
    if let Some(project) = project {
        merge_layer(&mut merged, project);
    }
    merged
}

fn merge_layer(base: &mut KerbcheckConfig, layer: KerbcheckConfig) {
    override_with(&mut base.powershell.executable, layer.powershell.executable);
    override_with(&mut base.spn.dns_suffix, layer.spn.dns_suffix);
    override_with(&mut base.directory.server, layer.directory.server);
    override_with(&mut base.directory.admin_user, layer.directory.admin_user);
    override_with(&mut base.directory.password_env, layer.directory.password_env);
    override_with(&mut base.topology.file, layer.topology.file);
}

fn override_with<T>(base: &mut Option<T>, layer: Option<T>) {
    if layer.is_some() {
        *base = layer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_overrides_global() {
        let mut global = KerbcheckConfig::new();
        global.powershell.executable = Some("pwsh".to_string());
        global.directory.admin_user = Some("ABCORP\\spnadmin".to_string());

        let mut project = KerbcheckConfig::new();
        project.directory.admin_user = Some("ABCORP\\sqladmin".to_string());
        project.spn.dns_suffix = Some("abcorp.local".to_string());

        let merged = merge_configs(Some(global), Some(project));
        assert_eq!(merged.powershell.executable(), "pwsh");
        assert_eq!(
            merged.directory.admin_user.as_deref(),
            Some("ABCORP\\sqladmin")
        );
        assert_eq!(merged.spn.dns_suffix.as_deref(), Some("abcorp.local"));
    }

    #[test]
    fn test_merge_without_layers_is_default() {
        assert_eq!(merge_configs(None, None), KerbcheckConfig::default());
    }
}
