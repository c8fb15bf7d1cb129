use crate::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

fn routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("/").name("Home").component(Component::new("Home")),
        RouteConfig::new("/a").name("A").component(Component::new("A")),
        RouteConfig::new("/b").component(Component::new("B")),
        RouteConfig::new("/c").component(Component::new("C")),
        RouteConfig::new("/user/:id").name("User").component(Component::new("User")),
    ]
}

fn memory_router(extra: Vec<RouteConfig>) -> Router {
    Router::new(RouterOptions::builder().routes(routes()).routes(extra).build())
}

fn counting_guard(count: &Arc<AtomicUsize>) -> NavigationGuard {
    let count = Arc::clone(count);
    guard_fn(move |_to, _from| {
        count.fetch_add(1, Ordering::SeqCst);
        async { GuardOutcome::Continue }
    })
}

#[tokio::test]
async fn test_push_commits_and_notifies() {
    let router = memory_router(vec![]);
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let listened = Arc::new(AtomicUsize::new(0));

    let log = Arc::clone(&transitions);
    router.after_each(move |to, from| {
        log.lock().push((from.full_path().to_string(), to.full_path().to_string()));
    });
    let seen = Arc::clone(&listened);
    router.listen(move |_route| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let route = router.push("/user/42?tab=posts").await.unwrap();
    assert_eq!(route.name(), Some("User"));
    assert_eq!(route.param("id"), Some("42"));
    assert_eq!(router.current_route().full_path(), "/user/42?tab=posts");

    router.push(RawLocation::named("A")).await.unwrap();
    assert_eq!(
        *transitions.lock(),
        vec![
            ("/".to_string(), "/user/42?tab=posts".to_string()),
            ("/user/42?tab=posts".to_string(), "/a".to_string()),
        ]
    );
    assert_eq!(listened.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_duplicate_navigation_is_reported() {
    let router = memory_router(vec![]);
    router.push("/a").await.unwrap();

    let err = router.push("/a").await.unwrap_err();
    assert!(err.is_navigation_failure(Some(NavigationFailureType::Duplicated)));
    assert!(!err.is_error());
    assert_eq!(err.from_path(), Some("/a"));

    // Same path, different query is a new navigation.
    assert!(router.push("/a?x=1").await.is_ok());
}

#[tokio::test]
async fn test_duplicate_push_adds_no_browser_entry() {
    for (mode, href) in [
        (HistoryMode::History, "https://example.com/a"),
        (HistoryMode::Hash, "https://example.com/#/a"),
    ] {
        let browser = Arc::new(SimulatedBrowser::new("https://example.com/").unwrap());
        let router = Router::new(
            RouterOptions::builder()
                .routes(routes())
                .mode(mode)
                .platform(browser.clone())
                .build(),
        );
        router.start().await.unwrap();
        router.push("/a").await.unwrap();
        let entries = browser.entries().len();

        let err = router.push("/a").await.unwrap_err();
        assert!(err.is_navigation_failure(Some(NavigationFailureType::Duplicated)));
        assert_eq!(browser.entries().len(), entries);
        assert_eq!(browser.href(), href);
    }
}

#[tokio::test]
async fn test_push_settles_after_hooks_and_ready_callbacks() {
    let router = memory_router(vec![]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    router.after_each(move |to, _from| log.lock().push(format!("after {}", to.path())));
    let log = Arc::clone(&seen);
    router.on_ready(move |route| log.lock().push(format!("ready {}", route.path())));

    let route = router.push("/a").await.unwrap();
    seen.lock().push(format!("resolved {}", route.path()));
    assert_eq!(*seen.lock(), vec!["after /a", "ready /a", "resolved /a"]);
}

#[tokio::test]
async fn test_newer_navigation_cancels_pending_one() {
    let router = memory_router(vec![]);
    let (release, gate) = tokio::sync::oneshot::channel::<()>();
    let gate = Arc::new(Mutex::new(Some(gate)));
    let started = Arc::new(tokio::sync::Notify::new());

    let entered = Arc::clone(&started);
    router.before_each(guard_fn(move |to, _from| {
        let gate = Arc::clone(&gate);
        let entered = Arc::clone(&entered);
        async move {
            if to.path() == "/a" {
                let waiting = gate.lock().take();
                if let Some(waiting) = waiting {
                    entered.notify_one();
                    let _ = waiting.await;
                }
            }
            GuardOutcome::Continue
        }
    }));

    let (slow, fast) = tokio::join!(router.push("/a"), async {
        started.notified().await;
        let result = router.push("/b").await;
        let _ = release.send(());
        result
    });

    assert_eq!(fast.unwrap().path(), "/b");
    let err = slow.unwrap_err();
    assert!(err.is_navigation_failure(Some(NavigationFailureType::Cancelled)));
    assert_eq!(err.to_path(), Some("/a"));
    assert_eq!(router.current_route().path(), "/b");
}

#[tokio::test]
async fn test_guard_abort_keeps_current_route() {
    let router = memory_router(vec![]);
    router.push("/a").await.unwrap();
    router.before_each(guard_fn(|to, _from| async move {
        if to.path() == "/b" {
            GuardOutcome::Abort
        } else {
            GuardOutcome::Continue
        }
    }));

    let err = router.push("/b").await.unwrap_err();
    assert!(err.is_navigation_failure(Some(NavigationFailureType::Aborted)));
    assert_eq!(router.current_route().path(), "/a");
}

#[tokio::test]
async fn test_guard_redirect_is_followed() {
    let router = memory_router(vec![]);
    router.push("/a").await.unwrap();
    router.before_each(guard_fn(|to, _from| async move {
        if to.path() == "/b" {
            GuardOutcome::Redirect(RawLocation::from("/c"))
        } else {
            GuardOutcome::Continue
        }
    }));

    let err = router.push("/b").await.unwrap_err();
    assert!(err.is_navigation_failure(Some(NavigationFailureType::Redirected)));
    assert_eq!(err.from_path(), Some("/a"));
    assert_eq!(err.to_path(), Some("/b"));
    assert_eq!(router.current_route().path(), "/c");
}

#[tokio::test]
async fn test_guard_error_reaches_error_callbacks() {
    let router = memory_router(vec![]);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    router.on_error(move |err| sink.lock().push(err.to_string()));

    router.before_each(guard_fn(|_to, _from| async {
        GuardOutcome::Error("permission denied".into())
    }));

    let err = router.push("/a").await.unwrap_err();
    assert!(matches!(err, NavigationError::Guard(_)));
    assert!(err.is_error());
    assert_eq!(*errors.lock(), vec!["navigation guard failed: permission denied".to_string()]);
    assert!(router.current_route().is_start());
}

#[tokio::test]
async fn test_control_signals_skip_error_callbacks() {
    let router = memory_router(vec![]);
    let reported = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&reported);
    router.on_error(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
    });

    router.push("/a").await.unwrap();
    let _ = router.push("/a").await;
    assert_eq!(reported.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_configured_redirect_and_alias() {
    let router = memory_router(vec![
        RouteConfig::new("/old").redirect("/b"),
        RouteConfig::new("/home").alias("/start").component(Component::new("Home")),
    ]);

    let route = router.push("/old").await.unwrap();
    assert_eq!(route.path(), "/b");
    assert_eq!(route.redirected_from(), Some("/old"));

    let route = router.push("/start").await.unwrap();
    assert_eq!(route.path(), "/start");
    assert_eq!(route.matched().last().map(|r| r.path()), Some("/home"));
}

#[tokio::test]
async fn test_before_enter_runs_only_on_activation() {
    let entered = Arc::new(AtomicUsize::new(0));
    let router = memory_router(vec![RouteConfig::new("/team")
        .component(Component::new("Team"))
        .before_enter(counting_guard(&entered))
        .child(RouteConfig::new("x").component(Component::new("X")))
        .child(RouteConfig::new("y").component(Component::new("Y")))]);

    router.push("/team/x").await.unwrap();
    router.push("/team/y").await.unwrap();
    assert_eq!(entered.load(Ordering::SeqCst), 1);

    router.push("/a").await.unwrap();
    router.push("/team/x").await.unwrap();
    assert_eq!(entered.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_lazy_view_loads_once() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let router = memory_router(vec![RouteConfig::new("/lazy").component(View::lazy(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BoxError>(Component::new("Lazy"))
        }
    }))]);

    let route = router.push("/lazy").await.unwrap();
    assert!(route.matched()[0].components()["default"].is_resolved());
    router.push("/a").await.unwrap();
    router.push("/lazy").await.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_lazy_view_failure_aborts_navigation() {
    let router = memory_router(vec![RouteConfig::new("/broken").component(View::lazy(|| async {
        Err::<Component, BoxError>("offline".into())
    }))]);
    let errors = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&errors);
    router.on_error(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
    });

    router.push("/a").await.unwrap();
    let err = router.push("/broken").await.unwrap_err();
    match err {
        NavigationError::AsyncComponent { view, reason } => {
            assert_eq!(view, "default");
            assert_eq!(reason.to_string(), "offline");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(router.current_route().path(), "/a");
}

#[tokio::test]
async fn test_enter_callback_waits_for_instance() {
    let delivered = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&delivered);
    let component = Component::new("Profile").before_route_enter(guard_fn(move |_to, _from| {
        let slot = Arc::clone(&slot);
        async move {
            GuardOutcome::continue_with(move |instance| {
                *slot.lock() = instance.downcast_ref::<u32>().copied();
            })
        }
    }));
    let router = memory_router(vec![RouteConfig::new("/profile").component(component)]);

    let route = router.push("/profile").await.unwrap();
    assert_eq!(*delivered.lock(), None);

    route.matched()[0].register_instance("default", Some(Arc::new(7u32)));
    assert_eq!(*delivered.lock(), Some(7));
}

#[tokio::test]
async fn test_leave_and_update_guards_need_a_live_instance() {
    let updates = Arc::new(AtomicUsize::new(0));
    let editor = Component::new("Editor")
        .before_route_update(counting_guard(&updates))
        .before_route_leave(guard_fn(|_to, _from| async { GuardOutcome::Abort }));
    let router = memory_router(vec![RouteConfig::new("/edit/:id").component(editor)]);

    // Nothing mounted: neither guard runs.
    router.push("/edit/1").await.unwrap();
    router.push("/edit/2").await.unwrap();
    router.push("/a").await.unwrap();
    assert_eq!(updates.load(Ordering::SeqCst), 0);

    let route = router.push("/edit/1").await.unwrap();
    route.matched()[0].register_instance("default", Some(Arc::new(())));

    router.push("/edit/2").await.unwrap();
    assert_eq!(updates.load(Ordering::SeqCst), 1);

    let err = router.push("/a").await.unwrap_err();
    assert!(err.is_navigation_failure(Some(NavigationFailureType::Aborted)));
    assert_eq!(router.current_route().path(), "/edit/2");

    route.matched()[0].register_instance("default", None);
    assert!(router.push("/a").await.is_ok());
}

#[tokio::test]
async fn test_before_resolve_runs_after_enter_guards() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&order);
    let component = Component::new("Page").before_route_enter(guard_fn(move |_to, _from| {
        log.lock().push("enter");
        async { GuardOutcome::Continue }
    }));
    let router = memory_router(vec![RouteConfig::new("/page").component(component)]);

    let log = Arc::clone(&order);
    router.before_resolve(guard_fn(move |_to, _from| {
        log.lock().push("resolve");
        async { GuardOutcome::Continue }
    }));
    let log = Arc::clone(&order);
    router.before_each(guard_fn(move |_to, _from| {
        log.lock().push("each");
        async { GuardOutcome::Continue }
    }));

    router.push("/page").await.unwrap();
    assert_eq!(*order.lock(), vec!["each", "enter", "resolve"]);
}

#[tokio::test]
async fn test_guard_queue_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let record = |label: &'static str| {
        let log = Arc::clone(&order);
        guard_fn(move |_to, _from| {
            log.lock().push(label);
            async { GuardOutcome::Continue }
        })
    };

    let router = memory_router(vec![RouteConfig::new("/shell")
        .component(Component::new("Shell").before_route_update(record("update")))
        .child(
            RouteConfig::new("p")
                .component(Component::new("Parent").before_route_leave(record("leave parent")))
                .child(
                    RouteConfig::new("c")
                        .component(Component::new("Child").before_route_leave(record("leave child"))),
                ),
        )
        .child(
            RouteConfig::new("n")
                .before_enter(record("before enter"))
                .component(Component::new("Next").before_route_enter(record("enter"))),
        )]);
    router.before_each(record("each"));
    router.before_resolve(record("resolve"));

    let route = router.push("/shell/p/c").await.unwrap();
    for mounted in route.matched() {
        mounted.register_instance("default", Some(Arc::new(())));
    }
    order.lock().clear();

    router.push("/shell/n").await.unwrap();
    assert_eq!(
        *order.lock(),
        vec![
            "leave child",
            "leave parent",
            "each",
            "update",
            "before enter",
            "enter",
            "resolve",
        ]
    );
}

#[tokio::test]
async fn test_redirect_function_can_call_back_into_router() {
    let handle: Arc<OnceLock<Weak<Router>>> = Arc::new(OnceLock::new());
    let slot = Arc::clone(&handle);
    let router = Arc::new(memory_router(vec![RouteConfig::new("/generate").redirect_with(
        move |_route| {
            if let Some(router) = slot.get().and_then(Weak::upgrade) {
                router.add_route(RouteConfig::new("/generated").name("Generated"));
                assert!(!router.get_routes().is_empty());
            }
            Ok(Some(RawLocation::from("/generated")))
        },
    )]));
    let _ = handle.set(Arc::downgrade(&router));

    let route = router.push("/generate").await.unwrap();
    assert_eq!(route.path(), "/generated");

    let route = router.match_route("/generated", None).unwrap();
    assert_eq!(route.name(), Some("Generated"));
}

#[tokio::test]
async fn test_removed_hooks_stop_running() {
    let router = memory_router(vec![]);
    let calls = Arc::new(AtomicUsize::new(0));
    let id = router.before_each(counting_guard(&calls));

    router.push("/a").await.unwrap();
    assert!(router.remove_hook(id));
    assert!(!router.remove_hook(id));
    router.push("/b").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_memory_traversal_replays_guards() {
    let router = memory_router(vec![]);
    router.push("/a").await.unwrap();
    router.push("/b").await.unwrap();

    let guards = Arc::new(AtomicUsize::new(0));
    router.before_each(counting_guard(&guards));
    let after = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&after);
    router.after_each(move |_to, _from| {
        count.fetch_add(1, Ordering::SeqCst);
    });

    router.back().await;
    assert_eq!(router.current_route().path(), "/a");
    router.forward().await;
    assert_eq!(router.current_route().path(), "/b");
    assert_eq!(guards.load(Ordering::SeqCst), 2);
    assert_eq!(after.load(Ordering::SeqCst), 2);

    router.go(5).await;
    assert_eq!(router.current_route().path(), "/b");
    assert_eq!(guards.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_replace_does_not_grow_memory_stack() {
    let router = memory_router(vec![]);
    router.push("/a").await.unwrap();
    router.replace("/b").await.unwrap();

    router.back().await;
    assert_eq!(router.current_route().path(), "/b");
}

#[tokio::test]
async fn test_ready_callbacks() {
    let router = memory_router(vec![]);
    router.before_each(guard_fn(|to, _from| async move {
        if to.path() == "/a" {
            GuardOutcome::Redirect(RawLocation::from("/b"))
        } else {
            GuardOutcome::Continue
        }
    }));

    let ready = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&ready);
    router.on_ready(move |route| log.lock().push(route.path().to_string()));

    // A redirect on the initial navigation does not fail readiness.
    let _ = router.push("/a").await;
    assert_eq!(*ready.lock(), vec!["/b".to_string()]);

    let log = Arc::clone(&ready);
    router.on_ready(move |route| log.lock().push(format!("late {}", route.path())));
    assert_eq!(*ready.lock(), vec!["/b".to_string(), "late /b".to_string()]);
}

#[tokio::test]
async fn test_ready_error_callbacks() {
    let router = memory_router(vec![]);
    let id = router.before_each(guard_fn(|_to, _from| async {
        GuardOutcome::Error("boot failed".into())
    }));

    let ready = Arc::new(AtomicBool::new(false));
    let failed = Arc::new(Mutex::new(None));
    let ready_flag = Arc::clone(&ready);
    let failure = Arc::clone(&failed);
    router.on_ready_with_error(
        move |_route| ready_flag.store(true, Ordering::SeqCst),
        move |err| *failure.lock() = Some(err.to_string()),
    );

    assert!(router.push("/a").await.is_err());
    assert_eq!(failed.lock().as_deref(), Some("navigation guard failed: boot failed"));

    router.remove_hook(id);
    router.push("/a").await.unwrap();
    assert!(!ready.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_refresh_picks_up_new_routes() {
    let router = memory_router(vec![RouteConfig::new("*").name("NotFound")]);
    let route = router.push("/settings").await.unwrap();
    assert_eq!(route.name(), Some("NotFound"));

    router.add_route(RouteConfig::new("/settings").name("Settings"));
    let route = router.refresh().await.unwrap();
    assert_eq!(route.name(), Some("Settings"));
}

#[tokio::test]
async fn test_hash_mode_tracks_browser() {
    let browser = Arc::new(SimulatedBrowser::new("https://example.com/").unwrap());
    let router = Router::new(
        RouterOptions::builder()
            .routes(routes())
            .mode(HistoryMode::Hash)
            .platform(browser.clone())
            .build(),
    );
    assert_eq!(router.mode(), HistoryMode::Hash);
    assert_eq!(browser.href(), "https://example.com/#/");

    let route = router.start().await.unwrap();
    assert_eq!(route.path(), "/");
    assert_eq!(browser.listener_count(), 1);

    router.push("/user/3").await.unwrap();
    assert_eq!(browser.href(), "https://example.com/#/user/3");
    assert_eq!(browser.entries().len(), 2);

    router.back().await;
    assert_eq!(router.current_route().path(), "/");
    assert_eq!(browser.cursor(), 0);

    router.teardown();
    assert_eq!(browser.listener_count(), 0);
    assert!(router.current_route().is_start());
}

#[tokio::test]
async fn test_history_mode_handles_native_traversal() {
    let browser = Arc::new(SimulatedBrowser::new("https://example.com/app/user/7").unwrap());
    let router = Router::new(
        RouterOptions::builder()
            .routes(routes())
            .mode(HistoryMode::History)
            .base("/app")
            .platform(browser.clone())
            .build(),
    );

    let route = router.start().await.unwrap();
    assert_eq!(route.param("id"), Some("7"));

    router.push("/a").await.unwrap();
    assert_eq!(browser.href(), "https://example.com/app/a");

    browser.go(-1);
    assert_eq!(router.handle_platform_events().await, 1);
    assert_eq!(router.current_route().param("id"), Some("7"));
}

#[tokio::test]
async fn test_guard_abort_restores_browser_address() {
    let browser = Arc::new(SimulatedBrowser::new("https://example.com/").unwrap());
    let router = Router::new(
        RouterOptions::builder()
            .routes(routes())
            .mode(HistoryMode::History)
            .platform(browser.clone())
            .build(),
    );
    router.start().await.unwrap();
    router.push("/a").await.unwrap();
    router.push("/b").await.unwrap();

    router.before_each(guard_fn(|_to, _from| async { GuardOutcome::Abort }));
    browser.go(-1);
    assert_eq!(browser.href(), "https://example.com/a");

    router.handle_platform_events().await;
    assert_eq!(router.current_route().path(), "/b");
    assert_eq!(browser.href(), "https://example.com/b");
}

#[tokio::test]
async fn test_history_mode_falls_back_to_hash() {
    let browser = Arc::new(
        SimulatedBrowser::new("https://example.com/user/9")
            .unwrap()
            .with_push_state_support(false),
    );
    let router = Router::new(
        RouterOptions::builder()
            .routes(routes())
            .mode(HistoryMode::History)
            .platform(browser.clone())
            .build(),
    );
    assert_eq!(router.mode(), HistoryMode::Hash);
    assert!(router.fell_back());
    assert_eq!(browser.href(), "https://example.com/#/user/9");

    let route = router.start().await.unwrap();
    assert_eq!(route.param("id"), Some("9"));

    router.push("/b").await.unwrap();
    assert_eq!(browser.href(), "https://example.com/#/b");

    router.back().await;
    assert_eq!(router.current_route().param("id"), Some("9"));
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture_warnings(f: impl FnOnce()) -> String {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    logs.contents()
}

#[test]
fn test_configuration_problems_are_logged() {
    let output = capture_warnings(|| {
        let router = memory_router(vec![
            RouteConfig::new("/other").name("A"),
            RouteConfig::new("relative"),
        ]);
        router.add_child_route("Missing", RouteConfig::new("/orphan"));
        let _ = router.match_route(RawLocation::named("Nowhere"), None);
    });

    assert!(output.contains("WARN"));
    assert!(output.contains("Duplicate named routes definition: { name: \"A\", path: \"/other\" }"));
    assert!(output.contains("Non-nested routes must include a leading slash character"));
    assert!(output.contains("Cannot find a parent route with name \"Missing\""));
    assert!(output.contains("Route with name 'Nowhere' does not exist"));
}

#[test]
fn test_successful_navigation_is_quiet() {
    let output = capture_warnings(|| {
        let router = memory_router(vec![]);
        futures::executor::block_on(async {
            router.push("/a").await.unwrap();
            router.push("/user/1").await.unwrap();
        });
    });
    assert_eq!(output, "");
}
