//! Schema-migration port. The registrar never runs SQL itself; the plugin
//! lifecycle asks a migrator to move the plugin's own tables up on install
//! and back to version 0 on uninstall.

pub trait SchemaMigrator {
    /// Applies pending migrations for `plugin_code` up to `target`, or to the
    /// latest known version when `target` is `None`. Returns the number of
    /// migrations applied.
    fn apply_migrations(&mut self, plugin_code: &str, target: Option<i32>) -> Result<usize, String>;

    /// Reverts applied migrations down to `target` (0 removes everything).
    /// Returns the number of migrations reverted.
    fn revert_migrations(&mut self, plugin_code: &str, target: i32) -> Result<usize, String>;

    fn current_version(&mut self, plugin_code: &str) -> Result<i32, String>;
}
