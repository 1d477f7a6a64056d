#[path = "../support/mod.rs"]
mod support;

#[cfg(test)]
mod directory_scenarios_tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use crossbeam::channel::RecvTimeoutError;

    use client::DiscoveryEvent;
    use common::DatagramSocket;

    use super::support::{self, registration, Cluster, QUIET, PUBLISH_INTERVAL};

    #[test]
    fn test_should_inform_interest() {
        let cluster = Cluster::start(3);
        cluster.lead();

        let info = registration("svc1", 9001);
        cluster.nodes[0].client.register(&info).unwrap();

        for node in &cluster.nodes {
            let before = node.wait_discovered(&info);
            assert_eq!(before, vec![DiscoveryEvent::InterestedIn("svc1".to_string())]);
        }

        // 后续广播重复同一快照，不应再有事件
        for node in &cluster.nodes {
            assert!(node.drain_for(QUIET).is_empty());
            assert_eq!(node.client.known_services().unwrap(), vec![info.clone()]);
        }
    }

    #[test]
    fn test_should_unregister() {
        let cluster = Cluster::start(3);
        cluster.lead();

        let info = registration("svc1", 9001);
        cluster.nodes[0].client.register(&info).unwrap();
        for node in &cluster.nodes {
            node.wait_discovered(&info);
        }

        let started = Instant::now();
        cluster.nodes[1].client.unregister("svc1").unwrap();

        for node in &cluster.nodes {
            assert!(node.wait_unregistered("svc1").is_empty());
        }
        // 注销通知先于陈旧判定到达
        assert!(started.elapsed() < support::staleness_threshold());

        for node in &cluster.nodes {
            assert!(node.drain_for(QUIET).is_empty());
            assert!(node.client.known_services().unwrap().is_empty());
        }
        assert!(cluster.directory.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_should_not_inform_interest() {
        let cluster = Cluster::start(3);

        let info = registration("svc1", 9001);
        cluster.nodes[0].client.register(&info).unwrap();

        for node in &cluster.nodes {
            assert!(node.drain_for(QUIET).is_empty());
        }
        assert!(cluster.directory.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_register_discover_multiple() {
        let cluster = Cluster::start(3);
        cluster.lead();

        let infos: Vec<_> = (0..3)
            .map(|i| registration(&format!("svc{}", i), 9000 + i))
            .collect();
        for (node, info) in cluster.nodes.iter().zip(&infos) {
            node.client.register(info).unwrap();
        }

        for node in &cluster.nodes {
            let mut discovered = Vec::new();
            let mut interested = Vec::new();
            while discovered.len() < infos.len() {
                let (event, skipped) = node
                    .wait_for(|event| matches!(event, DiscoveryEvent::Discovered(_)))
                    .expect("services were never discovered");
                interested.extend(skipped);
                discovered.push(event);
            }

            assert_eq!(interested.len(), infos.len());
            for info in &infos {
                assert!(discovered.contains(&DiscoveryEvent::Discovered(info.clone())));
                assert!(interested.contains(&DiscoveryEvent::InterestedIn(info.name().to_string())));
            }
        }
    }

    #[test]
    fn test_reregister_with_new_locations_rediscovers() {
        let cluster = Cluster::start(2);
        cluster.lead();

        let first = registration("svc1", 9001);
        cluster.nodes[0].client.register(&first).unwrap();
        for node in &cluster.nodes {
            node.wait_discovered(&first);
        }

        let second = registration("svc1", 9002);
        cluster.nodes[0].client.register(&second).unwrap();
        for node in &cluster.nodes {
            // 内容变化只重新通知发现，不再次表示关注
            assert!(node.wait_discovered(&second).is_empty());
        }
    }

    #[test]
    fn test_short_loss_is_tolerated() {
        let cluster = Cluster::start(2);
        cluster.lead();

        let info = registration("svc1", 9001);
        cluster.nodes[0].client.register(&info).unwrap();
        for node in &cluster.nodes {
            node.wait_discovered(&info);
        }

        // 丢失两次广播，仍在陈旧阈值内
        let muted = cluster.nodes[1].client.local_addr();
        cluster.network.mute(muted);
        thread::sleep(PUBLISH_INTERVAL * 2);
        cluster.network.unmute(muted);

        assert!(cluster.nodes[1].drain_for(QUIET).is_empty());
    }

    #[test]
    fn test_missed_notice_heals_through_staleness() {
        let cluster = Cluster::start(3);
        cluster.lead();

        let info = registration("svc1", 9001);
        cluster.nodes[0].client.register(&info).unwrap();
        for node in &cluster.nodes {
            node.wait_discovered(&info);
        }

        let muted = cluster.nodes[2].client.local_addr();
        cluster.network.mute(muted);
        cluster.nodes[0].client.unregister("svc1").unwrap();

        cluster.nodes[0].wait_unregistered("svc1");
        cluster.nodes[1].wait_unregistered("svc1");
        cluster.network.unmute(muted);

        // 错过注销通知，之后的快照里也没有该服务，按陈旧注销
        assert!(cluster.nodes[2].wait_unregistered("svc1").is_empty());
        assert!(cluster.nodes[2].drain_for(QUIET).is_empty());
    }

    #[test]
    fn test_malformed_datagrams_are_ignored() {
        let cluster = Cluster::start(1);
        cluster.lead();

        let node = &cluster.nodes[0];
        let socket = common::Network::bind(
            &cluster.network,
            std::net::SocketAddr::from(([127, 0, 0, 1], 0)),
        )
        .unwrap();
        socket
            .send_to(b"not a frame", cluster.directory.local_addr())
            .unwrap();
        socket
            .send_to(b"\xd1\x5c garbage", support::group().socket_addr())
            .unwrap();

        let info = registration("svc1", 9001);
        node.client.register(&info).unwrap();
        assert_eq!(
            node.wait_discovered(&info),
            vec![DiscoveryEvent::InterestedIn("svc1".to_string())]
        );
    }

    #[test]
    fn test_clients_ignore_commands_on_the_group() {
        let cluster = Cluster::start(2);

        let socket = common::Network::bind(
            &cluster.network,
            std::net::SocketAddr::from(([127, 0, 0, 1], 0)),
        )
        .unwrap();
        let register = common::Message::Register(registration("svc1", 9001))
            .encode(1024)
            .unwrap();
        socket
            .send_to(&register, support::group().socket_addr())
            .unwrap();

        for node in &cluster.nodes {
            assert!(node.drain_for(QUIET).is_empty());
            assert!(node.client.known_services().unwrap().is_empty());
        }
    }

    #[test]
    fn test_stop_releases_resources() {
        let mut cluster = Cluster::start(3);
        cluster.lead();
        assert_eq!(cluster.network.members(&support::group()).len(), 3);

        let mut node = cluster.nodes.pop().unwrap();
        let addr = node.client.local_addr();
        node.client.stop();
        node.client.stop();

        assert!(!cluster.network.is_bound(addr));
        assert_eq!(cluster.network.members(&support::group()).len(), 2);
        assert!(node.client.known_services().is_err());

        // 停止后不再有回调，事件通道随 actor 一起关闭
        while node.events.try_recv().is_ok() {}
        assert_eq!(
            node.events.recv_timeout(Duration::from_millis(100)),
            Err(RecvTimeoutError::Disconnected)
        );

        let directory_addr = cluster.directory.local_addr();
        cluster.directory.stop();
        assert!(!cluster.network.is_bound(directory_addr));
    }
}
