// tests/env_policy.rs

use scriptrun::EnvMap;
use scriptrun::exec::{COLOR_OVERLAY, layered_env};

#[test]
fn color_overlay_overrides_inherited_values() {
    let inherited = vec![("TERM", "dumb"), ("HOME", "/home/dev")];
    let env = layered_env(inherited, None);

    assert_eq!(env.get("TERM").map(String::as_str), Some("xterm-256color"));
    assert_eq!(env.get("HOME").map(String::as_str), Some("/home/dev"));
    for (name, value) in COLOR_OVERLAY {
        assert_eq!(env.get(name).map(String::as_str), Some(value));
    }
}

#[test]
fn extra_env_overrides_everything_below_it() {
    let inherited = vec![("PORT", "80"), ("PATH", "/usr/bin")];
    let mut extra = EnvMap::new();
    extra.insert("PORT".to_string(), "3001".to_string());
    extra.insert("FORCE_COLOR".to_string(), "0".to_string());

    let env = layered_env(inherited, Some(&extra));

    assert_eq!(env.get("PORT").map(String::as_str), Some("3001"));
    assert_eq!(env.get("FORCE_COLOR").map(String::as_str), Some("0"));
    assert_eq!(env.get("PATH").map(String::as_str), Some("/usr/bin"));
    assert_eq!(env.get("COLORTERM").map(String::as_str), Some("truecolor"));
}

#[cfg(unix)]
mod spawned {
    use std::sync::Arc;
    use std::time::Duration;

    use scriptrun::{EnvMap, ScriptManager};
    use scriptrun_test_utils::builders::ConfigBuilder;
    use scriptrun_test_utils::init_tracing;
    use scriptrun_test_utils::recording::RecordingSink;

    #[tokio::test]
    async fn spawned_command_sees_overlay_and_extra_env() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new();
        let manager = ScriptManager::new(&ConfigBuilder::fast().build(), sink.clone());

        let mut extra = EnvMap::new();
        extra.insert("PORT".to_string(), "4123".to_string());
        extra.insert("TERM".to_string(), "vt100".to_string());

        let outcome = manager
            .run_sequential(
                &["echo \"$FORCE_COLOR $COLORTERM $TERM $PORT\""],
                dir.path(),
                "env",
                Some(&extra),
            )
            .await;

        assert!(outcome.success, "{outcome:?}");
        assert!(
            sink.wait_for_terminal("env", Duration::from_secs(1)).await.is_some()
        );
        assert_eq!(sink.output_for("env"), "1 truecolor vt100 4123\n");
    }

    #[tokio::test]
    async fn command_runs_in_the_given_working_directory() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let manager = ScriptManager::new(&ConfigBuilder::fast().build(), Arc::new(scriptrun::relay::NullSink));

        let outcome = manager.run_and_wait(&["cat marker.txt"], dir.path(), None).await;

        assert!(outcome.success);
        assert_eq!(outcome.output, "here");
    }
}
