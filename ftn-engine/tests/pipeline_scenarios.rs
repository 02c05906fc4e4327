// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! End-to-end pipeline scenarios against in-process BinkP fakes.

use ftn_engine::{EngineConfig, ProbePipeline};
use ftn_lookup::StaticResolver;
use ftn_model::{
    ConnectivityType, InternetEndpoint, InternetProtocol, Node, NodeAddress, ProtocolStatus,
};
use ftn_probes::default_registry;
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

fn command_frame(command: u8, args: &[u8]) -> Vec<u8> {
    let length = (args.len() + 1) as u16;
    let mut frame = (0x8000u16 | length).to_be_bytes().to_vec();
    frame.push(command);
    frame.extend_from_slice(args);
    frame
}

async fn serve_binkd_once(listener: TcpListener, announced: &'static str) {
    let (mut stream, _) = listener.accept().await.expect("accept");
    serve_binkd_stream(&mut stream, announced).await;
}

async fn serve_binkd_stream(stream: &mut TcpStream, announced: &'static str) {
    let mut greeting = Vec::new();
    greeting.extend(command_frame(0, b"SYS Scenario BBS"));
    greeting.extend(command_frame(0, b"ZYZ Scenario Sysop"));
    greeting.extend(command_frame(0, b"VER binkd/1.1a-115 binkp/1.1"));
    greeting.extend(command_frame(1, announced.as_bytes()));
    stream.write_all(&greeting).await.expect("greeting");

    let mut sink = [0u8; 1024];
    let _ = stream.read(&mut sink).await;
    stream
        .write_all(&command_frame(4, b"non-secure"))
        .await
        .expect("M_OK");
    let _ = stream.read(&mut sink).await;
}

/// Bind a dual-stack pair of listeners sharing one port number.
async fn dual_stack_listeners() -> (TcpListener, TcpListener, u16) {
    for _ in 0..20 {
        let v4 = TcpListener::bind("127.0.0.1:0").await.expect("bind v4");
        let port = v4.local_addr().expect("addr").port();
        if let Ok(v6) = TcpListener::bind(SocketAddr::from(([0u16; 8], port))).await {
            return (v4, v6, port);
        }
    }
    panic!("could not find a port free on both families");
}

fn binkp_node(port: u16) -> Node {
    let mut node = Node {
        address: NodeAddress::new(2, 450, 1024),
        system_name: "Scenario BBS".into(),
        ..Default::default()
    };
    let _ = node.internet.protocols.insert(
        InternetProtocol::Binkp,
        vec![InternetEndpoint {
            address: Some("bbs.example.com".into()),
            port: Some(port),
        }],
    );
    node
}

fn pipeline_with(resolver: StaticResolver) -> ProbePipeline {
    ProbePipeline::new(
        Arc::new(resolver),
        None,
        default_registry(),
        Arc::new(EngineConfig::default()),
    )
}

#[tokio::test]
async fn dual_stack_binkp_success_combines_families() {
    let (v4_listener, v6_listener, port) = dual_stack_listeners().await;
    let v4_task = tokio::spawn(serve_binkd_once(v4_listener, "2:450/1024@fidonet"));
    let v6_task = tokio::spawn(serve_binkd_once(v6_listener, "2:450/1024@fidonet"));

    let resolver = StaticResolver::new().with_host(
        "bbs.example.com",
        vec!["127.0.0.1".parse().expect("v4")],
        vec!["::1".parse().expect("v6")],
    );
    let node = binkp_node(port);

    let result = pipeline_with(resolver)
        .test_hostname(&node, "bbs.example.com", 0)
        .await;
    let _ = v4_task.await;
    let _ = v6_task.await;

    assert!(result.is_operational);
    assert!(result.address_validated);
    assert!(result.address_validated_ipv4);
    assert!(result.address_validated_ipv6);

    let observation = result
        .protocol(InternetProtocol::Binkp)
        .observation()
        .expect("binkp tested");
    assert!(observation.ipv4.success && observation.ipv6.success);
    assert_eq!(observation.connectivity(), ConnectivityType::DualStack);
    assert_eq!(
        observation.response_ms(),
        Some(observation.ipv4.response_ms.min(observation.ipv6.response_ms)),
        "combined response must be the minimum of the successful families"
    );
}

#[tokio::test]
async fn dns_failure_short_circuits_with_no_protocols_tested() {
    let resolver = StaticResolver::new().with_failure("gone.example.com", "NXDOMAIN");
    let mut node = binkp_node(24554);
    let _ = node.internet.protocols.insert(
        InternetProtocol::Telnet,
        vec![InternetEndpoint::address_only("gone.example.com")],
    );

    let result = pipeline_with(resolver)
        .test_hostname(&node, "gone.example.com", 0)
        .await;

    assert!(!result.is_operational);
    assert_eq!(result.dns.error.as_deref(), Some("NXDOMAIN"));
    for protocol in InternetProtocol::ALL {
        assert!(
            matches!(result.protocol(protocol), ProtocolStatus::NotTested),
            "{protocol} must stay not-tested after a DNS failure"
        );
    }
}

#[tokio::test]
async fn ino4_flag_suppresses_ipv4_probing() {
    let (v4_listener, v6_listener, port) = dual_stack_listeners().await;
    // Only the IPv6 listener answers; a dial on v4 would hang the test.
    drop(v4_listener);
    let v6_task = tokio::spawn(serve_binkd_once(v6_listener, "2:450/1024@fidonet"));

    let resolver = StaticResolver::new().with_host(
        "bbs.example.com",
        vec!["127.0.0.1".parse().expect("v4")],
        vec!["::1".parse().expect("v6")],
    );
    let mut node = binkp_node(port);
    let _ = node
        .internet
        .info_flags
        .insert(ftn_model::node::INFO_FLAG_NO_IPV4.to_string());

    let result = pipeline_with(resolver)
        .test_hostname(&node, "bbs.example.com", 0)
        .await;
    let _ = v6_task.await;

    assert!(result.ipv4_skipped);
    let observation = result
        .protocol(InternetProtocol::Binkp)
        .observation()
        .expect("binkp tested");
    assert!(!observation.ipv4.tested, "IPv4 must be skipped under INO4");
    assert!(observation.ipv6.success, "IPv6 probing runs normally");
    assert_eq!(observation.connectivity(), ConnectivityType::Ipv6Only);
    assert!(result.is_operational);
}

#[tokio::test]
async fn multi_hostname_rollup_counts_working_and_failing() {
    let v4_listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = v4_listener.local_addr().expect("addr").port();
    let task = tokio::spawn(serve_binkd_once(v4_listener, "2:450/1024@fidonet"));

    let resolver = StaticResolver::new()
        .with_host(
            "up.example.com",
            vec!["127.0.0.1".parse().expect("v4")],
            vec![],
        )
        .with_failure("down.example.com", "NXDOMAIN");

    let mut node = binkp_node(port);
    let _ = node.internet.protocols.insert(
        InternetProtocol::Binkp,
        vec![
            InternetEndpoint {
                address: Some("up.example.com".into()),
                port: Some(port),
            },
            InternetEndpoint {
                address: Some("down.example.com".into()),
                port: Some(port),
            },
        ],
    );

    let results = pipeline_with(resolver).test_node(&node).await;
    let _ = task.await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].hostname_index, 0);
    assert_eq!(results[1].hostname_index, 1);
    assert!(results.iter().all(|r| r.total_hostnames == 2));
    assert!(results.iter().all(|r| r.hostnames_operational == 1));

    let aggregated = ftn_model::AggregatedTestResult::from_results(node.address, &results);
    assert!(aggregated.any_operational);
    assert_eq!(aggregated.working_hostnames.len(), 1);
    assert_eq!(aggregated.failing_hostnames.len(), 1);
    assert!((aggregated.success_rate - 50.0).abs() < f32::EPSILON);
    assert_eq!(aggregated.best_hostname.as_deref(), Some("up.example.com"));
}
