#[cfg(test)]
mod service_discovery_tests {
    use std::time::{Duration, Instant};

    use client::{ClientCache, DiscoveryEvent, ServiceState};
    use common::{Location, Message, ServiceRegistrationInfo};
    use directory::directory::{Leadership, Publisher, Registry, RegistryCommand};

    const PUBLISH_INTERVAL: Duration = Duration::from_millis(100);
    const MAX_MESSAGE_SIZE: usize = 256;

    fn info(name: &str, port: u16) -> ServiceRegistrationInfo {
        ServiceRegistrationInfo::new(name, vec![Location::new("10.0.0.1", port)])
    }

    /// 把注册表快照经过编码与解码送进客户端缓存
    fn deliver(registry: &Registry, cache: &mut ClientCache, now: Instant) -> Vec<DiscoveryEvent> {
        let publisher = Publisher::new(PUBLISH_INTERVAL);
        let mut events = Vec::new();
        for datagram in publisher.prepare(&registry.snapshot(), MAX_MESSAGE_SIZE).unwrap() {
            match Message::decode(&datagram).unwrap() {
                Message::Publish(entries) => events.extend(cache.reconcile(&entries, now)),
                other => panic!("unexpected message {:?}", other),
            }
        }
        events
    }

    #[test]
    fn test_registration_reaches_cache_once() {
        let mut registry = Registry::new();
        let mut cache = ClientCache::new(PUBLISH_INTERVAL * 3);
        let t0 = Instant::now();

        registry.apply(RegistryCommand::Register(info("svc1", 9001)), Leadership::Leader);

        let events = deliver(&registry, &mut cache, t0);
        assert_eq!(
            events,
            vec![
                DiscoveryEvent::InterestedIn("svc1".to_string()),
                DiscoveryEvent::Discovered(info("svc1", 9001)),
            ]
        );

        // 后续周期重复同一快照不产生事件
        for cycle in 1..5 {
            assert!(deliver(&registry, &mut cache, t0 + PUBLISH_INTERVAL * cycle).is_empty());
        }
        assert_eq!(cache.state_of("svc1"), ServiceState::Discovered);
    }

    #[test]
    fn test_not_leader_registry_produces_no_events() {
        let mut registry = Registry::new();
        let mut cache = ClientCache::new(PUBLISH_INTERVAL * 3);

        registry.apply(RegistryCommand::Register(info("svc1", 9001)), Leadership::NotLeader);

        assert!(deliver(&registry, &mut cache, Instant::now()).is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_batched_snapshot_refreshes_every_entry() {
        let mut registry = Registry::new();
        let mut cache = ClientCache::new(PUBLISH_INTERVAL * 3);
        let t0 = Instant::now();

        for i in 0..50 {
            registry.apply(
                RegistryCommand::Register(info(&format!("service-{:02}", i), 9000 + i)),
                Leadership::Leader,
            );
        }

        let events = deliver(&registry, &mut cache, t0);
        assert_eq!(events.len(), 100);
        assert_eq!(cache.discovered().len(), 50);

        // 每个批次都刷新各自的条目，不会有条目过期
        let t1 = t0 + PUBLISH_INTERVAL * 2;
        deliver(&registry, &mut cache, t1);
        assert!(cache.expire(t1 + PUBLISH_INTERVAL * 2).is_empty());
    }

    #[test]
    fn test_removal_by_notice_and_by_staleness() {
        let mut registry = Registry::new();
        let mut cache = ClientCache::new(PUBLISH_INTERVAL * 3);
        let t0 = Instant::now();

        registry.apply(RegistryCommand::Register(info("svc1", 9001)), Leadership::Leader);
        registry.apply(RegistryCommand::Register(info("svc2", 9002)), Leadership::Leader);
        deliver(&registry, &mut cache, t0);

        // 注销通知立即生效
        registry.apply(RegistryCommand::Unregister("svc1".to_string()), Leadership::Leader);
        let notice = Message::UnregisterNotice("svc1".to_string())
            .encode(MAX_MESSAGE_SIZE)
            .unwrap();
        let name = match Message::decode(&notice).unwrap() {
            Message::UnregisterNotice(name) => name,
            other => panic!("unexpected message {:?}", other),
        };
        assert_eq!(
            cache.remove(&name),
            Some(DiscoveryEvent::Unregistered("svc1".to_string()))
        );
        assert_eq!(cache.remove(&name), None);

        // 没有广播时 svc2 按陈旧处理
        let events = cache.expire(t0 + PUBLISH_INTERVAL * 4);
        assert_eq!(events, vec![DiscoveryEvent::Unregistered("svc2".to_string())]);
        assert!(cache.is_empty());
    }
}
