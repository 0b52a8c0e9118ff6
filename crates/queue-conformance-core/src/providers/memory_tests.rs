//! Tests for the in-memory queue service.

use super::*;

const VISIBILITY: Duration = Duration::from_secs(5);

fn service_with_queue() -> (InMemoryQueueService, QueueRef) {
    let service = InMemoryQueueService::default();
    let queue = service.create_queue("orders", VISIBILITY);
    (service, queue)
}

// ============================================================================
// Queue Listing
// ============================================================================

mod listing {
    use super::*;

    /// Verify listing matches on name prefix, not exact name.
    #[tokio::test]
    async fn test_list_queues_matches_prefix() {
        let service = InMemoryQueueService::default();
        let orders = service.create_queue("orders", VISIBILITY);
        let orders_dlq = service.create_queue("orders-dlq", VISIBILITY);
        service.create_queue("payments", VISIBILITY);

        let urls = service.list_queues("orders").await.unwrap();

        assert_eq!(urls.len(), 2);
        assert!(urls.contains(&orders.url().to_string()));
        assert!(urls.contains(&orders_dlq.url().to_string()));
    }

    /// Verify an unmatched prefix yields an empty list rather than an error.
    #[tokio::test]
    async fn test_list_queues_no_match() {
        let (service, _) = service_with_queue();
        let urls = service.list_queues("inventory").await.unwrap();
        assert!(urls.is_empty());
    }

    /// Verify creating the same queue twice does not duplicate it.
    #[tokio::test]
    async fn test_create_queue_is_idempotent() {
        let service = InMemoryQueueService::default();
        let first = service.create_queue("orders", VISIBILITY);
        let second = service.create_queue("orders", VISIBILITY);
        assert_eq!(first, second);
        assert_eq!(service.list_queues("orders").await.unwrap().len(), 1);
    }
}

// ============================================================================
// Delivery Semantics
// ============================================================================

mod delivery {
    use super::*;

    /// Verify a sent message is received with its body and token intact.
    #[tokio::test(start_paused = true)]
    async fn test_send_then_receive() {
        let (service, queue) = service_with_queue();
        let message = OutgoingMessage::new("Hello, World!");
        service.send_message(queue.url(), &message).await.unwrap();

        let received = service.receive_messages(queue.url()).await.unwrap();

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, "Hello, World!");
        assert!(received[0].belongs_to(&message.correlation_id));
        assert_eq!(received[0].receive_count, 1);
    }

    /// Verify an in-flight message stays hidden until its visibility timeout expires.
    #[tokio::test(start_paused = true)]
    async fn test_visibility_timeout_hides_message() {
        let (service, queue) = service_with_queue();
        service
            .send_message(queue.url(), &OutgoingMessage::new("hidden"))
            .await
            .unwrap();

        assert_eq!(service.receive_messages(queue.url()).await.unwrap().len(), 1);
        assert!(service.receive_messages(queue.url()).await.unwrap().is_empty());

        tokio::time::advance(VISIBILITY).await;

        let redelivered = service.receive_messages(queue.url()).await.unwrap();
        assert_eq!(redelivered.len(), 1);
        assert_eq!(redelivered[0].receive_count, 2);
    }

    /// Verify receive honours the configured batch limit.
    #[tokio::test(start_paused = true)]
    async fn test_receive_respects_max_messages() {
        let service = InMemoryQueueService::new(ReceiveOptions {
            max_messages: 2,
            wait_time_secs: 0,
        });
        let queue = service.create_queue("orders", VISIBILITY);
        for i in 0..3 {
            service
                .send_message(queue.url(), &OutgoingMessage::new(format!("m{}", i)))
                .await
                .unwrap();
        }

        assert_eq!(service.receive_messages(queue.url()).await.unwrap().len(), 2);
        assert_eq!(service.receive_messages(queue.url()).await.unwrap().len(), 1);
    }

    /// Verify operations on an unknown queue fail with QueueNotFound.
    #[tokio::test]
    async fn test_unknown_queue() {
        let service = InMemoryQueueService::default();
        let result = service
            .send_message("https://nowhere/0/missing", &OutgoingMessage::new("x"))
            .await;
        assert!(matches!(result, Err(QueueServiceError::QueueNotFound { .. })));
    }
}

// ============================================================================
// Deletion and Receipt Handles
// ============================================================================

mod deletion {
    use super::*;

    /// Verify deleting with a fresh handle removes the message permanently.
    #[tokio::test(start_paused = true)]
    async fn test_delete_removes_message() {
        let (service, queue) = service_with_queue();
        service
            .send_message(queue.url(), &OutgoingMessage::new("bye"))
            .await
            .unwrap();
        let mut received = service.receive_messages(queue.url()).await.unwrap();
        let message = received.remove(0);

        service
            .delete_message(queue.url(), message.receipt_handle)
            .await
            .unwrap();

        tokio::time::advance(VISIBILITY * 2).await;
        assert!(service.receive_messages(queue.url()).await.unwrap().is_empty());
        assert_eq!(service.message_count(queue.url()), 0);
        assert_eq!(service.delete_calls().len(), 1);
        assert!(service.double_deletes().is_empty());
    }

    /// Verify a handle presented twice is recorded as a double delete.
    #[tokio::test(start_paused = true)]
    async fn test_double_delete_is_recorded() {
        let (service, queue) = service_with_queue();
        service
            .send_message(queue.url(), &OutgoingMessage::new("once"))
            .await
            .unwrap();
        let mut received = service.receive_messages(queue.url()).await.unwrap();
        let raw = received.remove(0).receipt_handle.into_inner();

        service
            .delete_message(queue.url(), ReceiptHandle::new(raw.clone()))
            .await
            .unwrap();
        let second = service
            .delete_message(queue.url(), ReceiptHandle::new(raw.clone()))
            .await;

        assert!(matches!(second, Err(QueueServiceError::InvalidReceipt { .. })));
        assert_eq!(service.double_deletes(), vec![raw]);
    }

    /// Verify a handle from an earlier delivery is stale after redelivery.
    #[tokio::test(start_paused = true)]
    async fn test_stale_handle_rejected() {
        let (service, queue) = service_with_queue();
        service
            .send_message(queue.url(), &OutgoingMessage::new("stale"))
            .await
            .unwrap();
        let first = service.receive_messages(queue.url()).await.unwrap().remove(0);
        tokio::time::advance(VISIBILITY).await;
        let _second = service.receive_messages(queue.url()).await.unwrap().remove(0);

        let result = service.delete_message(queue.url(), first.receipt_handle).await;

        assert!(matches!(result, Err(QueueServiceError::InvalidReceipt { .. })));
        assert_eq!(service.message_count(queue.url()), 1);
    }
}

// ============================================================================
// Redrive
// ============================================================================

mod redrive {
    use super::*;

    /// Verify a message exceeding max receive count moves to the dead-letter queue.
    #[tokio::test(start_paused = true)]
    async fn test_redrive_after_max_receive_count() {
        let service = InMemoryQueueService::default();
        let (queue, dlq) = service.create_queue_with_dead_letter("orders", "orders-dlq", VISIBILITY, 1);
        service
            .send_message(queue.url(), &OutgoingMessage::new("Hello, DLQ!"))
            .await
            .unwrap();

        assert_eq!(service.receive_messages(queue.url()).await.unwrap().len(), 1);
        tokio::time::advance(VISIBILITY).await;

        // The receive that would exceed the threshold moves the message instead.
        assert!(service.receive_messages(queue.url()).await.unwrap().is_empty());
        assert_eq!(service.message_count(queue.url()), 0);
        assert_eq!(service.bodies(dlq.url()), vec!["Hello, DLQ!".to_string()]);

        let from_dlq = service.receive_messages(dlq.url()).await.unwrap();
        assert_eq!(from_dlq.len(), 1);
        assert_eq!(from_dlq[0].body, "Hello, DLQ!");
    }

    /// Verify a higher threshold allows that many deliveries first.
    #[tokio::test(start_paused = true)]
    async fn test_redrive_respects_threshold() {
        let service = InMemoryQueueService::default();
        let (queue, dlq) = service.create_queue_with_dead_letter("orders", "orders-dlq", VISIBILITY, 3);
        service
            .send_message(queue.url(), &OutgoingMessage::new("slow"))
            .await
            .unwrap();

        for expected_count in 1..=3 {
            let received = service.receive_messages(queue.url()).await.unwrap();
            assert_eq!(received[0].receive_count, expected_count);
            tokio::time::advance(VISIBILITY).await;
        }

        assert!(service.receive_messages(queue.url()).await.unwrap().is_empty());
        assert_eq!(service.message_count(dlq.url()), 1);
    }
}

// ============================================================================
// Fault Injection
// ============================================================================

mod faults {
    use super::*;

    /// Verify an injected fault fails exactly one call.
    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let (service, queue) = service_with_queue();
        service.fail_next(QueueOperation::ReceiveMessage);

        let first = service.receive_messages(queue.url()).await;
        assert!(matches!(first, Err(QueueServiceError::Transport { .. })));

        let second = service.receive_messages(queue.url()).await;
        assert!(second.is_ok());
    }

    /// Verify foreign messages carry no correlation token.
    #[tokio::test]
    async fn test_foreign_message_has_no_token() {
        let (service, queue) = service_with_queue();
        service.inject_foreign_message(queue.url(), "noise").unwrap();

        let received = service.receive_messages(queue.url()).await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].correlation_id.is_none());
    }
}
