
// Scenario tests driving the engine end to end
#[cfg(test)]
mod tests {
    use crate::bot::FixedBot;
    use crate::config::GameSettings;
    use crate::engine::{
        DisconnectOutcome, GameEngine, JoinOutcome, MoveOutcome, QueueOutcome, RoundReport,
    };
    use crate::error::GameError;
    use crate::events::{RoundResultKind, ServerEvent};
    use crate::rules::Move;
    use crate::services::{
        InMemoryPersistence, PersistenceError, PersistenceService, PlayerSummary, StatDelta,
    };
    use crate::session::{SessionId, UserId};
    use async_trait::async_trait;
    use std::sync::Arc;

    fn engine_with_bot(bot_move: Move) -> (GameEngine, Arc<InMemoryPersistence>) {
        let persistence = InMemoryPersistence::shared(100);
        let engine = GameEngine::new(
            GameSettings::default(),
            persistence.clone(),
            Arc::new(FixedBot(bot_move)),
        );
        (engine, persistence)
    }

    fn engine() -> GameEngine {
        engine_with_bot(Move::Rock).0
    }

    async fn ranked_pair(engine: &GameEngine, a: &UserId, b: &UserId) -> SessionId {
        assert!(matches!(
            engine.enqueue_ranked(a, None).await.unwrap(),
            QueueOutcome::Waiting
        ));
        match engine.enqueue_ranked(b, None).await.unwrap() {
            QueueOutcome::Matched {
                session_id,
                players,
            } => {
                assert_eq!(players[0], *a, "waiting occupant takes the left seat");
                session_id
            }
            other => panic!("expected a match, got {other:?}"),
        }
    }

    async fn play_round(
        engine: &GameEngine,
        session_id: &SessionId,
        a: (&UserId, Move),
        b: (&UserId, Move),
    ) -> RoundReport {
        assert!(matches!(
            engine.submit_move(a.0, session_id, a.1).await.unwrap(),
            MoveOutcome::Pending { .. }
        ));
        match engine.submit_move(b.0, session_id, b.1).await.unwrap() {
            MoveOutcome::Resolved(report) => report,
            other => panic!("expected resolution, got {other:?}"),
        }
    }

    fn result_for<'a>(report: &'a RoundReport, user: &UserId) -> &'a ServerEvent {
        &report
            .reports
            .iter()
            .find(|(u, _)| u == user)
            .expect("missing personalized report")
            .1
    }

    #[tokio::test]
    async fn ranked_series_resolves_and_records_stats() {
        let (engine, persistence) = engine_with_bot(Move::Rock);
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let session_id = ranked_pair(&engine, &alice, &bob).await;

        let first = play_round(
            &engine,
            &session_id,
            (&alice, Move::Rock),
            (&bob, Move::Scissors),
        )
        .await;
        assert!(!first.series_over);
        match result_for(&first, &alice) {
            ServerEvent::RoundResult {
                result,
                own_score,
                opponent_score,
                series_over,
                required_wins,
                ..
            } => {
                assert_eq!(*result, RoundResultKind::Win);
                assert_eq!((*own_score, *opponent_score), (1, 0));
                assert!(!series_over);
                assert_eq!(*required_wins, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let second = play_round(
            &engine,
            &session_id,
            (&alice, Move::Paper),
            (&bob, Move::Rock),
        )
        .await;
        assert!(second.series_over);
        assert!(second.leaderboard.is_some());
        match result_for(&second, &bob) {
            ServerEvent::RoundResult { result, .. } => assert_eq!(*result, RoundResultKind::Lose),
            other => panic!("unexpected event {other:?}"),
        }

        let rows = persistence.top_players(10).await.unwrap();
        let alice_row = rows.iter().find(|r| r.username == "alice").unwrap();
        let bob_row = rows.iter().find(|r| r.username == "bob").unwrap();
        assert_eq!((alice_row.wins, alice_row.wins_bo3), (1, 1));
        assert_eq!((bob_row.losses, bob_row.losses_bo3), (1, 1));

        // No wager on ranked play
        assert!(second.settlement.is_none());
    }

    #[tokio::test]
    async fn draws_do_not_advance_the_series() {
        let engine = engine();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let session_id = ranked_pair(&engine, &alice, &bob).await;

        for _ in 0..4 {
            let report = play_round(
                &engine,
                &session_id,
                (&alice, Move::Paper),
                (&bob, Move::Paper),
            )
            .await;
            assert!(!report.series_over);
            match result_for(&report, &alice) {
                ServerEvent::RoundResult {
                    result,
                    own_score,
                    opponent_score,
                    ..
                } => {
                    assert_eq!(*result, RoundResultKind::Draw);
                    assert_eq!((*own_score, *opponent_score), (0, 0));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn resubmission_within_a_round_is_ignored() {
        let engine = engine();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let session_id = ranked_pair(&engine, &alice, &bob).await;

        assert!(matches!(
            engine
                .submit_move(&alice, &session_id, Move::Rock)
                .await
                .unwrap(),
            MoveOutcome::Pending { .. }
        ));
        // Second submission from the same seat changes nothing.
        assert!(matches!(
            engine
                .submit_move(&alice, &session_id, Move::Paper)
                .await
                .unwrap(),
            MoveOutcome::Ignored
        ));

        let report = match engine
            .submit_move(&bob, &session_id, Move::Scissors)
            .await
            .unwrap()
        {
            MoveOutcome::Resolved(report) => report,
            other => panic!("expected resolution, got {other:?}"),
        };
        match result_for(&report, &alice) {
            ServerEvent::RoundResult {
                result, own_move, ..
            } => {
                assert_eq!(*own_move, Move::Rock, "first submission stands");
                assert_eq!(*result, RoundResultKind::Win);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_seeker_cannot_match_against_themselves() {
        let engine = engine();
        let alice = UserId::from("alice");

        assert!(matches!(
            engine.enqueue_ranked(&alice, None).await.unwrap(),
            QueueOutcome::Waiting
        ));
        assert!(matches!(
            engine.enqueue_ranked(&alice, None).await,
            Err(GameError::SelfMatch)
        ));
        // The slot still belongs to the original request.
        assert_eq!(engine.matchmaker().waiting().await, Some(alice));
    }

    #[tokio::test]
    async fn cancel_queue_frees_the_slot() {
        let engine = engine();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        engine.enqueue_ranked(&alice, None).await.unwrap();
        assert!(engine.cancel_queue(&alice).await);
        assert!(!engine.cancel_queue(&alice).await);

        assert!(matches!(
            engine.enqueue_ranked(&bob, None).await.unwrap(),
            QueueOutcome::Waiting
        ));
    }

    #[tokio::test]
    async fn even_round_counts_are_rejected() {
        let engine = engine();
        let alice = UserId::from("alice");
        assert!(matches!(
            engine.enqueue_ranked(&alice, Some(4)).await,
            Err(GameError::InvalidRounds(4))
        ));
        assert!(matches!(
            engine.enqueue_ranked(&alice, Some(0)).await,
            Err(GameError::InvalidRounds(0))
        ));
    }

    #[tokio::test]
    async fn link_sessions_fill_and_start() {
        let engine = engine();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let room = SessionId::from("room-1");

        assert!(matches!(
            engine
                .join_by_link(&alice, room.clone(), None)
                .await
                .unwrap(),
            JoinOutcome::Created { .. }
        ));
        match engine.join_by_link(&bob, room.clone(), None).await.unwrap() {
            JoinOutcome::Matched { players, .. } => {
                assert_eq!(players, vec![alice.clone(), bob.clone()]);
            }
            other => panic!("expected match, got {other:?}"),
        }
        // Rejoining is an idempotent no-op.
        assert!(matches!(
            engine.join_by_link(&alice, room, None).await.unwrap(),
            JoinOutcome::AlreadyJoined { .. }
        ));
    }

    #[tokio::test]
    async fn bot_series_settles_the_wager() {
        let (engine, persistence) = engine_with_bot(Move::Scissors);
        let alice = UserId::from("alice");

        let start = engine.start_bot_session(&alice, 30).await.unwrap();
        let session_id = start.session_id;

        // Rock beats the bot's scissors, twice; each submission
        // resolves synchronously.
        let first = match engine
            .submit_move(&alice, &session_id, Move::Rock)
            .await
            .unwrap()
        {
            MoveOutcome::Resolved(report) => report,
            other => panic!("expected resolution, got {other:?}"),
        };
        assert!(!first.series_over);
        assert!(first.settlement.is_none());

        let second = match engine
            .submit_move(&alice, &session_id, Move::Rock)
            .await
            .unwrap()
        {
            MoveOutcome::Resolved(report) => report,
            other => panic!("expected resolution, got {other:?}"),
        };
        assert!(second.series_over);
        let settlement = second.settlement.expect("wager must settle");
        assert_eq!(settlement.delta, 30 * 2 + 10);
        assert_eq!(settlement.new_balance, 170);
        assert_eq!(persistence.credit_balance(&alice).await.unwrap(), 170);

        // Bot sessions disappear once the series is over.
        assert!(engine.store().get(&session_id).await.is_none());
    }

    #[tokio::test]
    async fn losing_a_bot_series_costs_the_wager() {
        let (engine, persistence) = engine_with_bot(Move::Paper);
        let alice = UserId::from("alice");

        let start = engine.start_bot_session(&alice, 40).await.unwrap();
        for _ in 0..2 {
            engine
                .submit_move(&alice, &start.session_id, Move::Rock)
                .await
                .unwrap();
        }
        assert_eq!(persistence.credit_balance(&alice).await.unwrap(), 60);
    }

    #[tokio::test]
    async fn free_bot_win_still_pays_the_bonus() {
        let (engine, persistence) = engine_with_bot(Move::Scissors);
        let alice = UserId::from("alice");

        let start = engine.start_bot_session(&alice, 0).await.unwrap();
        for _ in 0..2 {
            engine
                .submit_move(&alice, &start.session_id, Move::Rock)
                .await
                .unwrap();
        }
        assert_eq!(persistence.credit_balance(&alice).await.unwrap(), 110);
    }

    #[tokio::test]
    async fn free_bot_loss_moves_no_credits() {
        let (engine, persistence) = engine_with_bot(Move::Paper);
        let alice = UserId::from("alice");

        let start = engine.start_bot_session(&alice, 0).await.unwrap();
        for _ in 0..2 {
            engine
                .submit_move(&alice, &start.session_id, Move::Rock)
                .await
                .unwrap();
        }
        assert_eq!(persistence.credit_balance(&alice).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn wagers_beyond_the_balance_are_rejected() {
        let (engine, _) = engine_with_bot(Move::Rock);
        let alice = UserId::from("alice");

        match engine.start_bot_session(&alice, 500).await {
            Err(GameError::InsufficientCredits { wager, balance }) => {
                assert_eq!(wager, 500);
                assert_eq!(balance, 100);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(engine.store().is_empty().await);
    }

    #[tokio::test]
    async fn starting_a_new_bot_game_replaces_the_old_one() {
        let (engine, _) = engine_with_bot(Move::Rock);
        let alice = UserId::from("alice");

        let first = engine.start_bot_session(&alice, 0).await.unwrap();
        let second = engine.start_bot_session(&alice, 0).await.unwrap();
        assert_ne!(first.session_id, second.session_id);
        assert!(engine.store().get(&first.session_id).await.is_none());
        assert!(engine.store().get(&second.session_id).await.is_some());
    }

    #[tokio::test]
    async fn disconnect_tears_down_the_session_and_names_the_opponent() {
        let engine = engine();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let session_id = ranked_pair(&engine, &alice, &bob).await;

        match engine.handle_disconnect(&alice).await {
            DisconnectOutcome::SessionClosed {
                session_id: closed,
                notify,
            } => {
                assert_eq!(closed, session_id);
                assert_eq!(notify, Some(bob.clone()));
            }
            other => panic!("expected session teardown, got {other:?}"),
        }
        assert!(engine.store().get(&session_id).await.is_none());

        // The survivor's next disconnect has nothing left to report.
        assert_eq!(engine.handle_disconnect(&bob).await, DisconnectOutcome::Idle);
    }

    #[tokio::test]
    async fn disconnect_while_waiting_clears_the_queue() {
        let engine = engine();
        let alice = UserId::from("alice");
        engine.enqueue_ranked(&alice, None).await.unwrap();

        assert_eq!(
            engine.handle_disconnect(&alice).await,
            DisconnectOutcome::QueueCleared
        );
        assert_eq!(engine.matchmaker().waiting().await, None);
    }

    #[tokio::test]
    async fn play_again_rewinds_a_finished_series() {
        let engine = engine();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let session_id = ranked_pair(&engine, &alice, &bob).await;

        // Play-again before the series ends is rejected.
        assert!(matches!(
            engine.request_play_again(&alice, &session_id).await,
            Err(GameError::SessionNotFinished(_))
        ));

        for _ in 0..2 {
            play_round(
                &engine,
                &session_id,
                (&alice, Move::Rock),
                (&bob, Move::Scissors),
            )
            .await;
        }

        let reset = engine.request_play_again(&bob, &session_id).await.unwrap();
        assert_eq!(reset.players.len(), 2);

        // A fresh round in the same session starts from zero.
        let report = play_round(
            &engine,
            &session_id,
            (&alice, Move::Scissors),
            (&bob, Move::Rock),
        )
        .await;
        match result_for(&report, &bob) {
            ServerEvent::RoundResult {
                result,
                own_score,
                opponent_score,
                ..
            } => {
                assert_eq!(*result, RoundResultKind::Win);
                assert_eq!((*own_score, *opponent_score), (1, 0));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn play_again_is_refused_once_the_opponent_has_left() {
        let engine = engine();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let session_id = ranked_pair(&engine, &alice, &bob).await;

        for _ in 0..2 {
            play_round(
                &engine,
                &session_id,
                (&alice, Move::Rock),
                (&bob, Move::Scissors),
            )
            .await;
        }

        // Bob walks away from the finished session.
        assert!(matches!(
            engine.handle_disconnect(&bob).await,
            DisconnectOutcome::SessionClosed { notify: None, .. }
        ));

        // There is nobody left to rematch, so the session is torn down
        // instead of restarting with one seat.
        assert!(matches!(
            engine.request_play_again(&alice, &session_id).await,
            Err(GameError::SessionNotFound(_))
        ));
        assert!(engine.store().get(&session_id).await.is_none());

        // The survivor is free to queue again immediately.
        assert!(matches!(
            engine.enqueue_ranked(&alice, None).await.unwrap(),
            QueueOutcome::Waiting
        ));
    }

    #[tokio::test]
    async fn rejoining_a_waiting_link_session_is_a_no_op() {
        let engine = engine();
        let alice = UserId::from("alice");
        let room = SessionId::from("room-1");

        assert!(matches!(
            engine
                .join_by_link(&alice, room.clone(), None)
                .await
                .unwrap(),
            JoinOutcome::Created { .. }
        ));
        // The creator clicks their own link again while the opposite
        // seat is still empty.
        assert!(matches!(
            engine.join_by_link(&alice, room.clone(), None).await.unwrap(),
            JoinOutcome::AlreadyJoined { .. }
        ));

        let handle = engine.store().get(&room).await.expect("session survives");
        assert_eq!(handle.lock().await.players().len(), 1);
    }

    #[tokio::test]
    async fn finished_sessions_release_players_for_new_matches() {
        let engine = engine();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let carol = UserId::from("carol");
        let session_id = ranked_pair(&engine, &alice, &bob).await;

        // While the series runs, a second session is refused.
        assert!(matches!(
            engine.enqueue_ranked(&alice, None).await,
            Err(GameError::AlreadyInSession)
        ));

        for _ in 0..2 {
            play_round(
                &engine,
                &session_id,
                (&alice, Move::Rock),
                (&bob, Move::Scissors),
            )
            .await;
        }

        // Once finished, enqueueing again releases the old session.
        assert!(matches!(
            engine.enqueue_ranked(&alice, None).await.unwrap(),
            QueueOutcome::Waiting
        ));
        assert!(matches!(
            engine.enqueue_ranked(&carol, None).await.unwrap(),
            QueueOutcome::Matched { .. }
        ));
    }

    #[tokio::test]
    async fn moves_after_the_series_are_ignored() {
        let engine = engine();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let session_id = ranked_pair(&engine, &alice, &bob).await;

        for _ in 0..2 {
            play_round(
                &engine,
                &session_id,
                (&alice, Move::Rock),
                (&bob, Move::Scissors),
            )
            .await;
        }
        assert!(matches!(
            engine
                .submit_move(&alice, &session_id, Move::Rock)
                .await
                .unwrap(),
            MoveOutcome::Ignored
        ));
    }

    #[tokio::test]
    async fn outsiders_cannot_submit_into_a_session() {
        let engine = engine();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let mallory = UserId::from("mallory");
        let session_id = ranked_pair(&engine, &alice, &bob).await;

        assert!(matches!(
            engine.submit_move(&mallory, &session_id, Move::Rock).await,
            Err(GameError::NotInSession(_))
        ));
        assert!(matches!(
            engine
                .submit_move(&alice, &SessionId::from("nope"), Move::Rock)
                .await,
            Err(GameError::SessionNotFound(_))
        ));
    }

    /// Stats and leaderboard reads fail, credit reads succeed.
    struct FlakyPersistence;

    #[async_trait]
    impl PersistenceService for FlakyPersistence {
        async fn increment_stats(
            &self,
            _user: &UserId,
            _delta: StatDelta,
        ) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("stats store down".into()))
        }

        async fn adjust_credits(
            &self,
            _user: &UserId,
            _delta: i64,
        ) -> Result<i64, PersistenceError> {
            Err(PersistenceError::Unavailable("ledger down".into()))
        }

        async fn credit_balance(&self, _user: &UserId) -> Result<i64, PersistenceError> {
            Ok(100)
        }

        async fn top_players(&self, _limit: usize) -> Result<Vec<PlayerSummary>, PersistenceError> {
            Err(PersistenceError::Unavailable("stats store down".into()))
        }
    }

    #[tokio::test]
    async fn persistence_outages_never_block_round_resolution() {
        let engine = GameEngine::new(
            GameSettings::default(),
            Arc::new(FlakyPersistence),
            Arc::new(FixedBot(Move::Scissors)),
        );
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let session_id = ranked_pair(&engine, &alice, &bob).await;

        for round in 0..2 {
            let report = play_round(
                &engine,
                &session_id,
                (&alice, Move::Rock),
                (&bob, Move::Scissors),
            )
            .await;
            if round == 1 {
                assert!(report.series_over, "the round resolves despite the outage");
                assert!(report.leaderboard.is_none());
                assert!(!report.notices.is_empty());
            }
        }

        // Same softness for bot settlement.
        let start = engine.start_bot_session(&alice, 20).await.unwrap();
        let mut last = None;
        for _ in 0..2 {
            if let MoveOutcome::Resolved(report) = engine
                .submit_move(&alice, &start.session_id, Move::Rock)
                .await
                .unwrap()
            {
                last = Some(report);
            }
        }
        let report = last.unwrap();
        assert!(report.series_over);
        assert!(report.settlement.is_none());
        assert!(!report.notices.is_empty());
    }

    #[tokio::test]
    async fn concurrent_submissions_resolve_exactly_once() {
        let engine = Arc::new(engine());
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let session_id = ranked_pair(&engine, &alice, &bob).await;

        let a = {
            let engine = engine.clone();
            let session_id = session_id.clone();
            let alice = alice.clone();
            tokio::spawn(async move { engine.submit_move(&alice, &session_id, Move::Rock).await })
        };
        let b = {
            let engine = engine.clone();
            let session_id = session_id.clone();
            let bob = bob.clone();
            tokio::spawn(async move { engine.submit_move(&bob, &session_id, Move::Scissors).await })
        };

        let outcomes = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        let resolved = outcomes
            .iter()
            .filter(|o| matches!(o, MoveOutcome::Resolved(_)))
            .count();
        let pending = outcomes
            .iter()
            .filter(|o| matches!(o, MoveOutcome::Pending { .. }))
            .count();
        assert_eq!((resolved, pending), (1, 1));
    }
}
