//! Console Module Tests
//!
//! ## Test Scopes
//! - **Parsing**: Prompt lines and script lines.
//! - **Forms**: Validation with re-prompting, replayed tokens and the recovery log.
//! - **Routing**: Console and transcript segments end up in the right place.
//! - **Session**: Full client flows against an in-process dispatcher.

#[cfg(test)]
mod tests {
    use crate::auth::{Hasher, Sha256Hasher};
    use crate::collection::CollectionStore;
    use crate::console::command::{ScriptStep, UserCommand, parse_line, parse_script_line};
    use crate::console::form::{InputOutcome, LineSource, MixedSource, RecordForm, ReplaySource};
    use crate::console::router::OutputRouter;
    use crate::console::session::{Console, Exchange, Flow};
    use crate::console::CommandLineError;
    use crate::dispatcher::Dispatcher;
    use crate::model::validation::{ValidationError, draft_to_tokens};
    use crate::model::fixtures::draft;
    use crate::persistence::{InMemoryRepository, RecordRepository};
    use crate::protocol::{CommandId, Payload, Request, Response};
    use crate::recovery::RecoveryLog;
    use crate::transport::TransportError;
    use std::future::Future;
    use std::io::Cursor;
    use std::sync::Arc;
    use tempfile::TempDir;

    const FIELDS: &str =
        "Alpha\n10\n2.5\n25\nFULL_TIME_EDUCATION\nSECOND\nBob\n1990-05-17\n180\nP-1\n";

    /// Runs requests straight through a dispatcher instead of over UDP.
    struct LocalServer {
        dispatcher: Dispatcher,
    }

    impl Exchange for LocalServer {
        fn exchange(
            &mut self,
            request: &Request,
        ) -> impl Future<Output = Result<Response, TransportError>> {
            let request = request.clone();
            let dispatcher = &self.dispatcher;
            async move { Ok(dispatcher.dispatch(request).await) }
        }
    }

    struct Harness {
        store: Arc<CollectionStore>,
        dir: TempDir,
        server: LocalServer,
    }

    fn harness() -> Harness {
        let repository = Arc::new(InMemoryRepository::new());
        repository
            .create_user("alice", &Sha256Hasher.hash("secret"))
            .unwrap();
        let store = Arc::new(CollectionStore::default());
        Harness {
            store: store.clone(),
            dir: TempDir::new().unwrap(),
            server: LocalServer {
                dispatcher: Dispatcher::new(store, repository),
            },
        }
    }

    type TestConsole = Console<LocalServer, Cursor<Vec<u8>>, Vec<u8>>;

    fn console(h: Harness, input: &str) -> (TestConsole, Arc<CollectionStore>, TempDir) {
        let log = RecoveryLog::new(h.dir.path().join("session.recovery"));
        let router = OutputRouter::new(Vec::new(), Some(h.dir.path().join("transcript.log")));
        let console = Console::new(
            h.server,
            Cursor::new(input.as_bytes().to_vec()),
            router,
            log,
        );
        (console, h.store, h.dir)
    }

    fn printed(console: TestConsole) -> String {
        String::from_utf8(console.into_output().into_console()).unwrap()
    }

    // ============================================================
    // PARSING
    // ============================================================

    #[test]
    fn test_parse_prompt_lines() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("exit").unwrap(), Some(UserCommand::Exit));
        assert_eq!(
            parse_line("remove_by_id 7").unwrap(),
            Some(UserCommand::Remote {
                command: CommandId::RemoveById,
                id: Some(7),
            })
        );
        assert_eq!(
            parse_line("show").unwrap(),
            Some(UserCommand::Remote {
                command: CommandId::Show,
                id: None,
            })
        );
        assert_eq!(
            parse_line("update").unwrap_err(),
            CommandLineError::MissingId(CommandId::Update)
        );
        assert!(matches!(
            parse_line("update x").unwrap_err(),
            CommandLineError::Invalid(ValidationError::NotANumber { .. })
        ));
        assert!(matches!(
            parse_line("login").unwrap_err(),
            CommandLineError::Unknown(_)
        ));
        assert_eq!(
            parse_line("execute_script").unwrap_err(),
            CommandLineError::MissingScriptPath
        );
    }

    #[test]
    fn test_parse_script_lines() {
        assert_eq!(parse_script_line("# comment").unwrap(), None);

        let line = format!("add,{},", draft_to_tokens(&draft("scripted")).join(","));
        assert_eq!(
            parse_script_line(&line).unwrap(),
            Some(ScriptStep::Remote {
                command: CommandId::Add,
                payload: Some(Payload::Record(draft("scripted"))),
            })
        );

        assert_eq!(
            parse_script_line("add,only,three").unwrap_err(),
            CommandLineError::Invalid(ValidationError::InsufficientArguments {
                expected: 10,
                found: 2,
            })
        );
        assert_eq!(
            parse_script_line("remove_lower,4").unwrap(),
            Some(ScriptStep::Remote {
                command: CommandId::RemoveLower,
                payload: Some(Payload::Id(4)),
            })
        );
    }

    // ============================================================
    // FORMS
    // ============================================================

    #[test]
    fn test_form_reprompts_until_valid() {
        let mut input = Cursor::new(format!("\n{}", FIELDS.replacen("25", "-3\n25", 1)));
        let mut output = Vec::new();
        let mut source = LineSource::new(&mut input, &mut output);

        let outcome = RecordForm::new(None).read_draft(&mut source).unwrap();
        let InputOutcome::Value(read) = outcome else {
            panic!("expected a draft, got {:?}", outcome);
        };
        assert_eq!(read.name, "Alpha");
        assert_eq!(read.students_count, 25);

        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("invalid value").count(), 2);
    }

    #[test]
    fn test_form_terminates_at_end_of_input() {
        let mut input = Cursor::new(b"Alpha\n10\n".to_vec());
        let mut output = Vec::new();
        let mut source = LineSource::new(&mut input, &mut output);

        let outcome = RecordForm::new(None).read_draft(&mut source).unwrap();
        assert_eq!(outcome, InputOutcome::Terminate);
    }

    #[test]
    fn test_form_logs_each_value_and_mixed_source_resumes() {
        let dir = TempDir::new().unwrap();
        let mut log = RecoveryLog::new(dir.path().join("log"));
        log.begin("add").unwrap();

        let mut replay = ReplaySource::new(vec!["Alpha".into(), "10".into(), "".into()]);
        let partial = RecordForm::new(Some(&mut log))
            .read_fields(&mut replay, &crate::model::validation::Field::ALL)
            .unwrap();
        assert_eq!(partial, InputOutcome::Terminate);

        let pending = log.resume().unwrap().unwrap();
        assert_eq!(pending.tokens, vec!["Alpha", "10", ""]);

        let rest = FIELDS.lines().skip(3).collect::<Vec<_>>().join("\n");
        let mut input = Cursor::new(rest.into_bytes());
        let mut output = Vec::new();
        let mut source = MixedSource::new(
            pending.tokens,
            LineSource::new(&mut input, &mut output),
        );
        let outcome = RecordForm::new(None).read_draft(&mut source).unwrap();
        let InputOutcome::Value(read) = outcome else {
            panic!("expected a draft");
        };
        assert_eq!(read.name, "Alpha");
        assert_eq!(read.coordinates.y, None);
        assert_eq!(read.group_admin.passport_id, "P-1");
    }

    // ============================================================
    // ROUTING
    // ============================================================

    #[test]
    fn test_router_splits_console_and_file_segments() {
        let dir = TempDir::new().unwrap();
        let transcript = dir.path().join("transcript.log");
        let mut router = OutputRouter::new(Vec::new(), Some(transcript.clone()));

        let mut response = Response::ok();
        response.console("on screen").file("in file").console("also on screen");
        router.route(&response).unwrap();

        let screen = String::from_utf8(router.into_console()).unwrap();
        assert_eq!(screen, "on screen\nalso on screen\n");
        assert_eq!(std::fs::read_to_string(transcript).unwrap(), "in file\n");
    }

    // ============================================================
    // SESSION
    // ============================================================

    #[tokio::test]
    async fn test_login_then_add_interactively() {
        let input = format!("l\nalice\nwrong\nl\nalice\nsecret\nadd\n{}exit\n", FIELDS);
        let (mut console, store, dir) = console(harness(), &input);

        assert!(console.login().await.unwrap());
        assert_eq!(console.session().unwrap().username, "alice");
        console.run().await.unwrap();

        let records = store.snapshot().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Alpha");
        assert_eq!(records[0].owner, "alice");
        assert!(!RecoveryLog::new(dir.path().join("session.recovery")).has_pending_session());

        let out = printed(console);
        assert!(out.contains("unauthorized"));
        assert!(out.contains("added"));
    }

    #[tokio::test]
    async fn test_register_new_user() {
        let (mut console, _store, _dir) = console(harness(), "r\ncarol\npw\n");
        assert!(console.login().await.unwrap());
        assert_eq!(console.session().unwrap().password_digest.len(), 64);
    }

    #[tokio::test]
    async fn test_interrupted_add_is_resumed_after_restart() {
        let h = harness();
        {
            let mut log = RecoveryLog::new(h.dir.path().join("session.recovery"));
            log.begin("add").unwrap();
            for token in ["Recovered", "10", "2.5"] {
                log.append(token).unwrap();
            }
        }

        let rest = FIELDS.lines().skip(3).collect::<Vec<_>>().join("\n");
        let input = format!("l\nalice\nsecret\ny\n{}\n", rest);
        let (mut console, store, dir) = console(h, &input);

        assert!(console.login().await.unwrap());
        console.offer_resume().await.unwrap();

        let records = store.snapshot().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Recovered");
        assert!(!RecoveryLog::new(dir.path().join("session.recovery")).has_pending_session());
    }

    #[tokio::test]
    async fn test_declined_resume_discards_log() {
        let h = harness();
        {
            let mut log = RecoveryLog::new(h.dir.path().join("session.recovery"));
            log.begin("add").unwrap();
            log.append("Stale").unwrap();
        }

        let (mut console, store, dir) = console(h, "l\nalice\nsecret\nn\n");
        assert!(console.login().await.unwrap());
        console.offer_resume().await.unwrap();

        assert!(store.is_empty().await);
        assert!(!RecoveryLog::new(dir.path().join("session.recovery")).has_pending_session());
    }

    #[tokio::test]
    async fn test_update_checks_existence_before_prompting() {
        let (mut console, _store, _dir) = console(harness(), "l\nalice\nsecret\n");
        assert!(console.login().await.unwrap());

        assert_eq!(console.handle_line("update 99").await.unwrap(), Flow::Continue);

        let out = printed(console);
        assert!(out.contains("no group with id 99"));
        assert!(!out.contains("group name"));
    }

    #[tokio::test]
    async fn test_script_runs_valid_lines_and_skips_bad_ones() {
        let h = harness();
        let script = h.dir.path().join("batch.txt");
        let add = format!("add,{}", draft_to_tokens(&draft("from-script")).join(","));
        std::fs::write(
            &script,
            format!(
                "# setup\n{}\nadd,too,few\nexecute_script,batch.txt\nshow\n",
                add
            ),
        )
        .unwrap();

        let (mut console, store, dir) = console(h, "l\nalice\nsecret\n");
        assert!(console.login().await.unwrap());
        console
            .handle_line(&format!("execute_script {}", script.display()))
            .await
            .unwrap();

        let records = store.snapshot().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "from-script");

        let transcript = std::fs::read_to_string(dir.path().join("transcript.log")).unwrap();
        assert!(transcript.contains("from-script"));

        let out = printed(console);
        assert!(out.contains("skipped"));
        assert!(out.contains("already running"));
        assert!(!out.contains("added"), "scripted commands are muted");
    }

    #[tokio::test]
    async fn test_exit_inside_script_ends_session() {
        let h = harness();
        let script = h.dir.path().join("stop.txt");
        std::fs::write(&script, "info\nexit\nclear\n").unwrap();

        let (mut console, _store, _dir) = console(h, "l\nalice\nsecret\n");
        assert!(console.login().await.unwrap());
        let flow = console
            .handle_line(&format!("execute_script {}", script.display()))
            .await
            .unwrap();
        assert_eq!(flow, Flow::Exit);
    }
}
