use hookbox::domain::{
    ContainerHandle, ContainerState, ExportDirective, HttpWait, PortSpec, Timeout,
};
use hookbox::error::HookError;
use hookbox::services::{CompositeService, GroupState, HookDispatcher, HooksBuilder};
use hookbox::test_support::MockRuntime;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

fn compose(builder: HooksBuilder) -> (CompositeService, Arc<MockRuntime>) {
    let runtime = Arc::new(MockRuntime::new());
    let dispatcher = HookDispatcher::from_registry(&builder.build());
    (CompositeService::new(runtime.clone(), dispatcher), runtime)
}

#[test]
fn test_web_copy_wait_execute_ordering() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let (mut service, runtime) = compose(
        HooksBuilder::new()
            .copy_on_start("web", "site/index.html", "/usr/share/nginx/html/index.html")
            .wait_for_port("web", PortSpec::tcp(80), Timeout::from_millis(30_000))
            .execute_on_running("web", ["echo ready"]),
    );
    runtime
        .add_container("web")
        .set_endpoint(listener.local_addr().unwrap());

    service.start().unwrap();

    assert_eq!(
        runtime.get_commands(),
        vec![
            "create",
            "copy_to:web:/usr/share/nginx/html/index.html",
            "start",
            "port:web:80/tcp",
            "exec:web:echo ready",
        ]
    );
    assert_eq!(service.state(), GroupState::Running);
}

#[test]
fn test_failing_command_aborts_remaining_hooks() {
    let (mut service, runtime) = compose(
        HooksBuilder::new()
            .execute_on_running("db", ["false", "echo never"])
            .execute_on_running("web", ["echo after"]),
    );
    runtime.add_container("db").set_exit_code("false", 1);
    runtime.add_container("web");

    let err = service.start().unwrap_err();

    match err {
        HookError::ExecutionFault {
            service,
            command,
            exit_code,
            ..
        } => {
            assert_eq!(service, "db");
            assert_eq!(command, "false");
            assert_eq!(exit_code, Some(1));
        }
        other => panic!("unexpected error: {other}"),
    }

    let commands = runtime.get_commands();
    assert_eq!(commands.last().unwrap(), "exec:db:false");
    assert!(!commands.contains(&"exec:web:echo after".to_string()));
}

#[test]
fn test_undeclared_services_are_skipped() {
    let (mut service, runtime) = compose(
        HooksBuilder::new()
            .copy_on_start("ghost", "a", "/a")
            .wait_for_port("ghost", PortSpec::tcp(1), Timeout::from_millis(1))
            .wait_for_process("ghost", "nothing", Timeout::from_millis(1))
            .wait_for_http("ghost", HttpWait::new("http://127.0.0.1:1/"))
            .execute_on_running("ghost", ["false"])
            .copy_on_dispose("ghost", "/b", "b")
            .execute_on_disposing("ghost", ["false"])
            .export_on_dispose("ghost", "ghost.tar"),
    );
    runtime.add_container("web");

    service.start().unwrap();
    service.dispose().unwrap();

    assert_eq!(runtime.get_commands(), vec!["create", "start", "down"]);
}

#[test]
fn test_export_condition_checked_at_dispose() {
    let (mut service, runtime) = compose(
        HooksBuilder::new()
            .export(
                "db",
                ExportDirective::new("/tmp/db", true)
                    .when(|c| matches!(c.state(), Ok(ContainerState::Running))),
            )
            .export_on_dispose_when("cache", "/tmp/cache", false, |c| c.name() == "web"),
    );
    let db = runtime.add_container("db");
    runtime.add_container("cache");

    service.start().unwrap();
    runtime.clear_commands();
    db.set_state(ContainerState::Running);
    service.dispose().unwrap();

    assert_eq!(runtime.get_commands(), vec!["export:db:/tmp/db:exploded", "down"]);
}

#[test]
fn test_restart_rewaits_and_reexecutes() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let (mut service, runtime) = compose(
        HooksBuilder::new()
            .copy_on_start("web", "conf", "/etc/app")
            .wait_for_port("web", PortSpec::tcp(8080), Timeout::from_millis(5000))
            .execute_on_running("web", ["echo ready"]),
    );
    runtime
        .add_container("web")
        .set_endpoint(listener.local_addr().unwrap());

    service.start().unwrap();
    runtime.clear_commands();
    service.restart().unwrap();

    assert_eq!(
        runtime.get_commands(),
        vec![
            "stop",
            "copy_to:web:/etc/app",
            "start",
            "port:web:8080/tcp",
            "exec:web:echo ready",
        ]
    );
}

#[test]
fn test_port_timeout_surfaces_from_start() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let (mut service, runtime) = compose(
        HooksBuilder::new()
            .wait_for_port("web", PortSpec::tcp(80), Timeout::from_millis(300))
            .execute_on_running("web", ["echo ready"]),
    );
    runtime.add_container("web").set_endpoint(addr);

    let err = service.start().unwrap_err();

    assert!(err.is_timeout());
    assert!(
        !runtime
            .get_commands()
            .contains(&"exec:web:echo ready".to_string())
    );
}

#[test]
fn test_http_wait_between_port_and_execute() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
            );
        }
    });

    let (mut service, runtime) = compose(
        HooksBuilder::new()
            .wait_for_port("api", PortSpec::tcp(3000), Timeout::from_millis(5000))
            .wait_for_http(
                "api",
                HttpWait::new(format!("http://{addr}/health"))
                    .timeout(Timeout::from_millis(5000)),
            )
            .execute_on_running("api", ["echo healthy"]),
    );
    runtime.add_container("api").set_endpoint(addr);

    service.start().unwrap();

    assert_eq!(
        runtime.get_commands(),
        vec!["create", "start", "port:api:3000/tcp", "exec:api:echo healthy"]
    );
}
