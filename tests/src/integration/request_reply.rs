//! End-to-end matching correctness over the memory bus.

#[cfg(test)]
mod tests {
    use memory_bus::{correlated_reply_headers, Headers, MemoryBus};
    use parking_lot::Mutex;
    use reply_mediator::{
        CallOptions, CorrelationMediator, CorrelationToken, InboundContext, ReplyRouter,
    };
    use std::any::Any;
    use std::sync::Arc;
    use std::time::Duration;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Mediator wired to a memory bus through a reply router.
    fn wired() -> (Arc<MemoryBus>, Arc<CorrelationMediator<String>>) {
        let router = Arc::new(ReplyRouter::new());
        let mediator = Arc::new(CorrelationMediator::<String>::new());
        router.register(mediator.dispatcher());
        (Arc::new(MemoryBus::new(router)), mediator)
    }

    #[tokio::test]
    async fn test_echo_server_round_trip() {
        let (bus, mediator) = wired();
        bus.register_service("server", |message: String, _: &Headers| {
            format!("reply to '{message}'")
        });

        let outcome = mediator
            .send_and_await(
                bus.as_ref(),
                "TestContent".to_string(),
                CallOptions::new()
                    .with_destination("server")
                    .with_timeout(Duration::from_secs(60)),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.into_reply().as_deref(),
            Some("reply to 'TestContent'")
        );
        assert_eq!(mediator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_caller_supplied_token_round_trip() {
        let (bus, mediator) = wired();
        bus.register_service("server", |message: String, _: &Headers| message);

        let token = CorrelationToken::new();
        let outcome = mediator
            .send_and_await(
                bus.as_ref(),
                "ping".to_string(),
                CallOptions::new()
                    .with_token(token)
                    .with_destination("server")
                    .with_timeout(Duration::from_secs(60)),
            )
            .await
            .unwrap();

        match outcome {
            reply_mediator::ReplyOutcome::Reply { reply, context } => {
                assert_eq!(reply, "ping");
                assert_eq!(context.correlation("CorrelationId"), Some(token));
            }
            reply_mediator::ReplyOutcome::TimedOut => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_calls_with_shuffled_replies() {
        const CALLS: usize = 16;

        let (bus, mediator) = wired();

        // Endpoint that parks every request and answers them all in
        // reverse arrival order once the last one is in.
        let router = bus.router();
        let parked: Arc<Mutex<Vec<(String, Headers)>>> = Arc::new(Mutex::new(Vec::new()));
        bus.register_endpoint("batch-server", move |payload: Box<dyn Any + Send>, headers| {
            let message = *payload.downcast::<String>().expect("string request");
            let mut queue = parked.lock();
            queue.push((message, headers.clone()));
            if queue.len() == CALLS {
                for (request, request_headers) in queue.drain(..).rev() {
                    let context =
                        InboundContext::from_headers(correlated_reply_headers(&request_headers));
                    router.deliver_typed(format!("reply to '{request}'"), context);
                }
            }
            None
        });

        let mut handles = Vec::new();
        for i in 0..CALLS {
            let bus = Arc::clone(&bus);
            let mediator = Arc::clone(&mediator);
            handles.push(tokio::spawn(async move {
                let outcome = mediator
                    .send_and_await(
                        bus.as_ref(),
                        format!("req-{i}"),
                        CallOptions::new()
                            .with_destination("batch-server")
                            .with_timeout(Duration::from_secs(10)),
                    )
                    .await
                    .unwrap();
                (i, outcome.into_reply())
            }));
        }

        // Every caller gets exactly the reply carrying its own token,
        // regardless of arrival order.
        for handle in handles {
            let (i, reply) = handle.await.unwrap();
            assert_eq!(reply.as_deref(), Some(format!("reply to 'req-{i}'").as_str()));
        }
        assert_eq!(mediator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_headerless_reply_matches_single_caller() {
        let (bus, mediator) = wired();

        // Endpoint that strips all headers from its reply.
        bus.register_endpoint("legacy-server", |payload: Box<dyn Any + Send>, _headers| {
            let message = *payload.downcast::<String>().expect("string request");
            Some((
                Box::new(format!("bare reply to '{message}'")) as Box<dyn Any + Send>,
                Headers::new(),
            ))
        });

        let outcome = mediator
            .send_and_await(
                bus.as_ref(),
                "ping".to_string(),
                CallOptions::new()
                    .with_destination("legacy-server")
                    .with_timeout(Duration::from_secs(10)),
            )
            .await
            .unwrap();

        assert_eq!(outcome.into_reply().as_deref(), Some("bare reply to 'ping'"));
        assert_eq!(
            mediator
                .stats()
                .fallback_matched
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_headerless_reply_prefers_most_recent_caller() {
        let (bus, mediator) = wired();
        bus.register_endpoint("sink", |_payload, _headers| None);
        let dispatcher = mediator.dispatcher();

        // Two headerless callers, registered in a known order.
        let early = {
            let bus = Arc::clone(&bus);
            let mediator = Arc::clone(&mediator);
            tokio::spawn(async move {
                mediator
                    .send_and_await(
                        bus.as_ref(),
                        "early".to_string(),
                        CallOptions::new()
                            .with_destination("sink")
                            .with_timeout(Duration::from_millis(400)),
                    )
                    .await
                    .unwrap()
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let late = {
            let bus = Arc::clone(&bus);
            let mediator = Arc::clone(&mediator);
            tokio::spawn(async move {
                mediator
                    .send_and_await(
                        bus.as_ref(),
                        "late".to_string(),
                        CallOptions::new()
                            .with_destination("sink")
                            .with_timeout(Duration::from_millis(400)),
                    )
                    .await
                    .unwrap()
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(mediator.pending_count(), 2);

        // A reply with no usable correlation header reaches the most
        // recently registered caller; the other keeps waiting.
        dispatcher.on_reply("anonymous".to_string(), InboundContext::new());

        let late_outcome = late.await.unwrap();
        assert_eq!(late_outcome.into_reply().as_deref(), Some("anonymous"));

        let early_outcome = early.await.unwrap();
        assert!(early_outcome.is_timed_out());
        assert_eq!(mediator.pending_count(), 0);
    }
}
