#[path = "../support/mod.rs"]
mod support;

#[cfg(test)]
mod altered_leadership_tests {
    use std::thread;

    use client::DiscoveryEvent;

    use super::support::{registration, staleness_threshold, Cluster, PUBLISH_INTERVAL, QUIET};

    #[test]
    fn test_altered_leadership() {
        let cluster = Cluster::start(3);
        cluster.lead();

        let info = registration("svc1", 9001);
        cluster.nodes[0].client.register(&info).unwrap();
        for node in &cluster.nodes {
            node.wait_discovered(&info);
        }

        // 放弃领导权后广播停止，客户端按陈旧注销
        cluster.step_down();
        for node in &cluster.nodes {
            assert!(node.wait_unregistered("svc1").is_empty());
        }
        for node in &cluster.nodes {
            assert!(node.drain_for(QUIET).is_empty());
        }

        // 注册表在非领导期间保留
        assert!(cluster.directory.snapshot().unwrap().contains("svc1"));

        // 重新成为领导者后再次走完整的发现流程
        cluster.lead();
        for node in &cluster.nodes {
            assert_eq!(
                node.wait_discovered(&info),
                vec![DiscoveryEvent::InterestedIn("svc1".to_string())]
            );
        }
    }

    #[test]
    fn test_commands_while_stepped_down_are_dropped() {
        let cluster = Cluster::start(2);
        cluster.lead();
        cluster.step_down();

        cluster.nodes[0]
            .client
            .register(&registration("svc1", 9001))
            .unwrap();
        thread::sleep(PUBLISH_INTERVAL * 3);

        cluster.lead();
        assert!(cluster.directory.snapshot().unwrap().is_empty());
        for node in &cluster.nodes {
            assert!(node.drain_for(QUIET).is_empty());
        }
    }

    #[test]
    fn test_unregister_while_stepped_down_is_dropped() {
        let cluster = Cluster::start(2);
        cluster.lead();

        let info = registration("svc1", 9001);
        cluster.nodes[0].client.register(&info).unwrap();
        for node in &cluster.nodes {
            node.wait_discovered(&info);
        }

        cluster.step_down();
        cluster.nodes[1].client.unregister("svc1").unwrap();
        thread::sleep(staleness_threshold());

        cluster.lead();
        assert_eq!(cluster.directory.snapshot().unwrap().get("svc1"), Some(&info));
    }
}
