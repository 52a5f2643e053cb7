use crate::discovery;
use crate::error::{AppError, AppResult};
use crate::models::ProjectSettings;
use crate::prompt::UserPrompt;
use crate::store::SettingsStore;
use crate::terminal::Terminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// EF Core database providers offered by the scaffold picker.
const SCAFFOLD_PROVIDERS: &[&str] = &[
    "Microsoft.EntityFrameworkCore.SqlServer",
    "Npgsql.EntityFrameworkCore.PostgreSQL",
    "Pomelo.EntityFrameworkCore.MySql",
];

/// The one bit-exact contract of the whole system. Paths go in verbatim
/// between double quotes; embedded quote characters are not escaped, so a
/// quote inside a path or connection string breaks the line. Known gap,
/// deliberately preserved.
pub fn compose_command(settings: &ProjectSettings, subcommand: &str) -> String {
    format!(
        "dotnet ef {} --startup-project \"{}\" --project \"{}\"",
        subcommand, settings.startup_project_path, settings.migration_project_path
    )
}

/// Formats and dispatches `dotnet ef` invocations for the active workspace.
/// One instance per daemon; every panel action and palette endpoint funnels
/// through it.
pub struct EfCoreManager {
    store: Arc<SettingsStore>,
    workspace: Option<PathBuf>,
    terminal: Arc<dyn Terminal>,
    prompt: Arc<dyn UserPrompt>,
}

impl EfCoreManager {
    pub fn new(
        store: Arc<SettingsStore>,
        workspace: Option<PathBuf>,
        terminal: Arc<dyn Terminal>,
        prompt: Arc<dyn UserPrompt>,
    ) -> Self {
        Self {
            store,
            workspace,
            terminal,
            prompt,
        }
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }

    fn workspace_id(&self) -> Option<String> {
        self.workspace
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned())
    }

    /// Settings for the active workspace. `None` is the normal
    /// not-yet-configured state (or no workspace open at all).
    pub fn settings_snapshot(&self) -> Option<ProjectSettings> {
        self.store.get(&self.workspace_id()?)
    }

    /// Overwrite both project references for the active workspace in one
    /// step; they are never set individually.
    pub fn set_settings(
        &self,
        startup_project_path: String,
        migration_project_path: String,
    ) -> AppResult<()> {
        let workspace_id = self.workspace_id().ok_or(AppError::NoWorkspace)?;
        self.store
            .set(&workspace_id, startup_project_path, migration_project_path)?;
        self.prompt.notify("Settings saved!");
        Ok(())
    }

    pub fn find_csproj_files(&self) -> AppResult<Vec<String>> {
        let root = self.workspace_root().ok_or(AppError::NoWorkspace)?;
        discovery::find_csproj_files(root)
    }

    /// Compose one `dotnet ef` command line and hand it to the terminal,
    /// scoped to the workspace root. Fire and forget.
    pub fn execute_command(&self, subcommand: &str, show_terminal: bool) -> AppResult<()> {
        let settings = self
            .settings_snapshot()
            .ok_or(AppError::ProjectsNotConfigured)?;
        if settings.startup_project_path.is_empty() || settings.migration_project_path.is_empty() {
            return Err(AppError::ProjectsNotConfigured);
        }

        let root = self
            .workspace_root()
            .ok_or(AppError::NoWorkspace)?
            .to_path_buf();

        let command_line = compose_command(&settings, subcommand);
        self.terminal.run(&command_line, &root, show_terminal)
    }

    /// Discover project files and let the user pick the startup and the
    /// migration project. Either dismissal cancels the whole flow.
    pub async fn configure_projects(&self) -> AppResult<()> {
        let files = self.find_csproj_files()?;
        if files.is_empty() {
            return Err(AppError::NoProjectFiles);
        }

        let Some(startup) = self
            .prompt
            .pick(
                "Select Startup Project (project with Program.cs)",
                files.clone(),
            )
            .await
        else {
            return Ok(());
        };

        let Some(migration) = self
            .prompt
            .pick("Select Migration Project (project with DbContext)", files)
            .await
        else {
            return Ok(());
        };

        self.set_settings(startup, migration)
    }

    pub async fn create_migration(&self, name: &str) -> AppResult<()> {
        if name.trim().is_empty() {
            return Err(AppError::EmptyMigrationName);
        }
        self.execute_command(&format!("migrations add {name}"), true)
    }

    /// Destructive: applies every pending migration, so it asks first.
    /// Declining is a silent no-op.
    pub async fn update_database(&self) -> AppResult<()> {
        if self.prompt.confirm("Apply all migrations to the database?").await {
            self.execute_command("database update", true)?;
        }
        Ok(())
    }

    /// Destructive: drops the newest migration, so it asks first.
    pub async fn remove_last_migration(&self) -> AppResult<()> {
        if self.prompt.confirm("Remove the last migration?").await {
            self.execute_command("migrations remove", true)?;
        }
        Ok(())
    }

    pub async fn list_migrations(&self) -> AppResult<()> {
        self.execute_command("migrations list", true)
    }

    pub async fn rollback_to_migration(&self) -> AppResult<()> {
        let target = self
            .prompt
            .input(
                "Enter migration name to rollback to (or 0 for complete rollback)",
                "InitialCreate",
            )
            .await;

        if let Some(target) = target {
            self.execute_command(&format!("database update {target}"), true)?;
        }
        Ok(())
    }

    pub async fn scaffold_db_context(&self) -> AppResult<()> {
        let Some(connection_string) = self
            .prompt
            .input("Enter connection string", "Server=localhost;Database=MyDb;...")
            .await
        else {
            return Ok(());
        };
        if connection_string.is_empty() {
            return Ok(());
        }

        let providers = SCAFFOLD_PROVIDERS.iter().map(|p| p.to_string()).collect();
        let Some(provider) = self.prompt.pick("Select database provider", providers).await else {
            return Ok(());
        };

        self.execute_command(
            &format!("dbcontext scaffold \"{connection_string}\" {provider}"),
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    /// Records every dispatched command line instead of spawning anything.
    #[derive(Default)]
    struct RecordingTerminal {
        runs: Mutex<Vec<(String, PathBuf, bool)>>,
    }

    impl RecordingTerminal {
        fn lines(&self) -> Vec<String> {
            self.runs
                .lock()
                .unwrap()
                .iter()
                .map(|(line, _, _)| line.clone())
                .collect()
        }
    }

    impl Terminal for RecordingTerminal {
        fn run(&self, command_line: &str, cwd: &Path, show: bool) -> AppResult<()> {
            self.runs.lock().unwrap().push((
                command_line.to_string(),
                cwd.to_path_buf(),
                show,
            ));
            Ok(())
        }
    }

    /// Plays back canned dialog answers in order.
    #[derive(Default)]
    struct ScriptedPrompt {
        confirms: Mutex<VecDeque<bool>>,
        inputs: Mutex<VecDeque<Option<String>>>,
        picks: Mutex<VecDeque<Option<String>>>,
        notices: Mutex<Vec<String>>,
    }

    impl ScriptedPrompt {
        fn with_confirm(answer: bool) -> Self {
            let prompt = Self::default();
            prompt.confirms.lock().unwrap().push_back(answer);
            prompt
        }

        fn with_inputs(answers: Vec<Option<&str>>) -> Self {
            let prompt = Self::default();
            prompt
                .inputs
                .lock()
                .unwrap()
                .extend(answers.into_iter().map(|a| a.map(str::to_string)));
            prompt
        }

        fn with_picks(answers: Vec<Option<&str>>) -> Self {
            let prompt = Self::default();
            prompt
                .picks
                .lock()
                .unwrap()
                .extend(answers.into_iter().map(|a| a.map(str::to_string)));
            prompt
        }

        fn push_pick(&self, answer: Option<&str>) {
            self.picks
                .lock()
                .unwrap()
                .push_back(answer.map(str::to_string));
        }
    }

    #[async_trait]
    impl UserPrompt for ScriptedPrompt {
        async fn confirm(&self, _message: &str) -> bool {
            self.confirms.lock().unwrap().pop_front().unwrap_or(false)
        }

        async fn input(&self, _message: &str, _placeholder: &str) -> Option<String> {
            self.inputs.lock().unwrap().pop_front().flatten()
        }

        async fn pick(&self, _message: &str, _items: Vec<String>) -> Option<String> {
            self.picks.lock().unwrap().pop_front().flatten()
        }

        fn notify(&self, message: &str) {
            self.notices.lock().unwrap().push(message.to_string());
        }
    }

    struct Fixture {
        manager: EfCoreManager,
        terminal: Arc<RecordingTerminal>,
        prompt: Arc<ScriptedPrompt>,
        _dir: TempDir,
    }

    fn fixture(workspace_open: bool, prompt: ScriptedPrompt) -> Fixture {
        let dir = tempdir().unwrap();
        let store = Arc::new(SettingsStore::load(&dir.path().join("projects.json")).unwrap());
        let terminal = Arc::new(RecordingTerminal::default());
        let prompt = Arc::new(prompt);
        let workspace = workspace_open.then(|| dir.path().to_path_buf());
        let manager = EfCoreManager::new(
            store,
            workspace,
            Arc::clone(&terminal) as Arc<dyn Terminal>,
            Arc::clone(&prompt) as Arc<dyn UserPrompt>,
        );
        Fixture {
            manager,
            terminal,
            prompt,
            _dir: dir,
        }
    }

    fn configured_fixture(prompt: ScriptedPrompt) -> Fixture {
        let fx = fixture(true, prompt);
        fx.manager
            .set_settings("A/A.csproj".to_string(), "B/B.csproj".to_string())
            .unwrap();
        fx
    }

    #[test]
    fn compose_command_matches_the_contract() {
        let settings = ProjectSettings::new("A/A.csproj".to_string(), "B/B.csproj".to_string());
        assert_eq!(
            compose_command(&settings, "migrations list"),
            "dotnet ef migrations list --startup-project \"A/A.csproj\" --project \"B/B.csproj\""
        );
    }

    #[test]
    fn set_settings_without_workspace_fails_and_mutates_nothing() {
        let fx = fixture(false, ScriptedPrompt::default());
        let result = fx
            .manager
            .set_settings("A/A.csproj".to_string(), "B/B.csproj".to_string());
        assert!(matches!(result, Err(AppError::NoWorkspace)));
        assert_eq!(fx.manager.settings_snapshot(), None);
        assert!(fx.prompt.notices.lock().unwrap().is_empty());
    }

    #[test]
    fn set_then_snapshot_round_trips() {
        let fx = configured_fixture(ScriptedPrompt::default());
        let settings = fx.manager.settings_snapshot().unwrap();
        assert_eq!(settings.startup_project_path, "A/A.csproj");
        assert_eq!(settings.migration_project_path, "B/B.csproj");
        assert_eq!(
            fx.prompt.notices.lock().unwrap().as_slice(),
            ["Settings saved!"]
        );
    }

    #[test]
    fn execute_command_without_settings_dispatches_nothing() {
        let fx = fixture(true, ScriptedPrompt::default());
        let result = fx.manager.execute_command("migrations list", true);
        assert!(matches!(result, Err(AppError::ProjectsNotConfigured)));
        assert!(fx.terminal.lines().is_empty());
    }

    #[tokio::test]
    async fn list_migrations_composes_the_exact_line() {
        let fx = configured_fixture(ScriptedPrompt::default());
        fx.manager.list_migrations().await.unwrap();
        assert_eq!(
            fx.terminal.lines(),
            ["dotnet ef migrations list --startup-project \"A/A.csproj\" --project \"B/B.csproj\""]
        );
    }

    #[tokio::test]
    async fn create_migration_rejects_blank_names() {
        let fx = configured_fixture(ScriptedPrompt::default());

        assert!(matches!(
            fx.manager.create_migration("").await,
            Err(AppError::EmptyMigrationName)
        ));
        assert!(matches!(
            fx.manager.create_migration("   ").await,
            Err(AppError::EmptyMigrationName)
        ));
        assert!(fx.terminal.lines().is_empty());
    }

    #[tokio::test]
    async fn create_migration_dispatches_migrations_add() {
        let fx = configured_fixture(ScriptedPrompt::default());
        fx.manager.create_migration("AddUser").await.unwrap();
        assert_eq!(
            fx.terminal.lines(),
            ["dotnet ef migrations add AddUser --startup-project \"A/A.csproj\" --project \"B/B.csproj\""]
        );
    }

    #[tokio::test]
    async fn declined_update_database_is_a_silent_noop() {
        let fx = configured_fixture(ScriptedPrompt::with_confirm(false));
        fx.manager.update_database().await.unwrap();
        assert!(fx.terminal.lines().is_empty());
    }

    #[tokio::test]
    async fn confirmed_update_database_dispatches() {
        let fx = configured_fixture(ScriptedPrompt::with_confirm(true));
        fx.manager.update_database().await.unwrap();
        assert_eq!(
            fx.terminal.lines(),
            ["dotnet ef database update --startup-project \"A/A.csproj\" --project \"B/B.csproj\""]
        );
    }

    #[tokio::test]
    async fn declined_remove_migration_is_a_silent_noop() {
        let fx = configured_fixture(ScriptedPrompt::with_confirm(false));
        fx.manager.remove_last_migration().await.unwrap();
        assert!(fx.terminal.lines().is_empty());
    }

    #[tokio::test]
    async fn confirmed_remove_migration_dispatches() {
        let fx = configured_fixture(ScriptedPrompt::with_confirm(true));
        fx.manager.remove_last_migration().await.unwrap();
        assert_eq!(
            fx.terminal.lines(),
            ["dotnet ef migrations remove --startup-project \"A/A.csproj\" --project \"B/B.csproj\""]
        );
    }

    #[tokio::test]
    async fn rollback_dispatches_with_the_entered_target() {
        let fx = configured_fixture(ScriptedPrompt::with_inputs(vec![Some("InitialCreate")]));
        fx.manager.rollback_to_migration().await.unwrap();
        assert_eq!(
            fx.terminal.lines(),
            ["dotnet ef database update InitialCreate --startup-project \"A/A.csproj\" --project \"B/B.csproj\""]
        );
    }

    #[tokio::test]
    async fn dismissed_rollback_dispatches_nothing() {
        let fx = configured_fixture(ScriptedPrompt::with_inputs(vec![None]));
        fx.manager.rollback_to_migration().await.unwrap();
        assert!(fx.terminal.lines().is_empty());
    }

    #[tokio::test]
    async fn scaffold_quotes_the_connection_string() {
        let prompt =
            ScriptedPrompt::with_inputs(vec![Some("Server=localhost;Database=MyDb;Trusted_Connection=True;")]);
        prompt.push_pick(Some("Npgsql.EntityFrameworkCore.PostgreSQL"));
        let fx = configured_fixture(prompt);

        fx.manager.scaffold_db_context().await.unwrap();
        assert_eq!(
            fx.terminal.lines(),
            ["dotnet ef dbcontext scaffold \"Server=localhost;Database=MyDb;Trusted_Connection=True;\" Npgsql.EntityFrameworkCore.PostgreSQL --startup-project \"A/A.csproj\" --project \"B/B.csproj\""]
        );
    }

    #[tokio::test]
    async fn scaffold_without_connection_string_dispatches_nothing() {
        let fx = configured_fixture(ScriptedPrompt::with_inputs(vec![None]));
        fx.manager.scaffold_db_context().await.unwrap();
        assert!(fx.terminal.lines().is_empty());

        let fx = configured_fixture(ScriptedPrompt::with_inputs(vec![Some("")]));
        fx.manager.scaffold_db_context().await.unwrap();
        assert!(fx.terminal.lines().is_empty());
    }

    #[tokio::test]
    async fn scaffold_with_dismissed_provider_dispatches_nothing() {
        let prompt = ScriptedPrompt::with_inputs(vec![Some("Server=localhost;")]);
        prompt.push_pick(None);
        let fx = configured_fixture(prompt);

        fx.manager.scaffold_db_context().await.unwrap();
        assert!(fx.terminal.lines().is_empty());
    }

    #[tokio::test]
    async fn configure_projects_stores_the_picked_pair() {
        let fx = fixture(
            true,
            ScriptedPrompt::with_picks(vec![Some("A/A.csproj"), Some("B/B.csproj")]),
        );
        for relative in ["A/A.csproj", "B/B.csproj"] {
            let path = fx.manager.workspace_root().unwrap().join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "<Project />").unwrap();
        }

        fx.manager.configure_projects().await.unwrap();

        let settings = fx.manager.settings_snapshot().unwrap();
        assert_eq!(settings.startup_project_path, "A/A.csproj");
        assert_eq!(settings.migration_project_path, "B/B.csproj");
    }

    #[tokio::test]
    async fn configure_projects_without_manifests_fails() {
        let fx = fixture(true, ScriptedPrompt::default());
        assert!(matches!(
            fx.manager.configure_projects().await,
            Err(AppError::NoProjectFiles)
        ));
    }

    #[tokio::test]
    async fn configure_projects_dismissed_pick_cancels_silently() {
        let fx = fixture(true, ScriptedPrompt::with_picks(vec![None]));
        let path = fx.manager.workspace_root().unwrap().join("A/A.csproj");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "<Project />").unwrap();

        fx.manager.configure_projects().await.unwrap();
        assert_eq!(fx.manager.settings_snapshot(), None);
    }
}
