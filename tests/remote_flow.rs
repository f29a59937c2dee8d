//! End-to-end flow: panel, background session and appliance channel together.

use std::{sync::Arc, time::Duration};

use microwave_remote::{
    channel::{ChannelEvent, Command, MemoryChannel, RemoteChannel},
    panel::{ConnectionStatus, ControlPanel, IntentOutcome, PanelSettings, PanelView, UserIntent},
    session::{SessionController, SessionEvent},
    state::{ApplianceState, CountdownSnapshot, CountdownState, StatusMessage},
    tasks::{session_sync_task, status_refresh_task},
};

struct Remote {
    channel: Arc<MemoryChannel>,
    session: SessionController,
    panel: ControlPanel,
}

fn remote() -> Remote {
    let channel = Arc::new(MemoryChannel::new());
    let session = SessionController::new();
    let dyn_channel: Arc<dyn RemoteChannel> = channel.clone();

    tokio::spawn(session_sync_task(session.clone(), dyn_channel.subscribe()));
    tokio::spawn(status_refresh_task(Arc::clone(&dyn_channel), None));
    let panel = ControlPanel::spawn(dyn_channel, session.clone(), PanelSettings::default());

    Remote {
        channel,
        session,
        panel,
    }
}

fn status(state: ApplianceState, remaining: u64) -> ChannelEvent {
    ChannelEvent::Status(StatusMessage::new(state, remaining))
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

async fn view_where(panel: &ControlPanel, check: impl FnMut(&PanelView) -> bool) -> PanelView {
    let mut views = panel.watch();
    let view = tokio::time::timeout(Duration::from_secs(5), views.wait_for(check))
        .await
        .expect("panel view in time")
        .expect("panel task alive");
    view.clone()
}

#[tokio::test(start_paused = true)]
async fn full_cooking_cycle() {
    let remote = remote();
    settle().await;
    assert_eq!(remote.panel.view().connection, ConnectionStatus::Connecting);

    remote.channel.inject(ChannelEvent::Connected);
    settle().await;
    assert_eq!(remote.channel.take_sent(), vec![Command::RequestStatus]);

    remote.channel.inject(status(ApplianceState::Idle, 0));
    settle().await;
    for delta in [60, 60, 10] {
        remote.panel.submit(UserIntent::AddTime { delta }).await.unwrap();
    }
    assert_eq!(remote.panel.submit(UserIntent::Start).await.unwrap(), IntentOutcome::Accepted);
    assert_eq!(remote.channel.take_sent(), vec![Command::Start { seconds: 130 }]);

    // Appliance picked it up a second later
    remote.channel.inject(status(ApplianceState::Running, 129));
    settle().await;
    let view = remote.panel.refresh().await.unwrap();
    settle().await;
    assert_eq!(view.appliance, ApplianceState::Running);
    assert_eq!(
        remote.session.snapshot(),
        CountdownSnapshot::new(CountdownState::Running, 130)
    );

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(remote.panel.refresh().await.unwrap().remaining, 120);

    assert_eq!(remote.panel.submit(UserIntent::Pause).await.unwrap(), IntentOutcome::Accepted);
    remote.channel.inject(status(ApplianceState::Pause, 119));
    settle().await;
    remote.panel.refresh().await.unwrap();
    settle().await;
    assert_eq!(
        remote.session.snapshot(),
        CountdownSnapshot::new(CountdownState::Paused, 120)
    );

    assert_eq!(remote.panel.submit(UserIntent::Start).await.unwrap(), IntentOutcome::Accepted);
    remote.channel.inject(status(ApplianceState::Running, 120));
    settle().await;
    remote.panel.refresh().await.unwrap();
    settle().await;
    assert!(remote.session.snapshot().is_running());

    let mut events = remote.session.subscribe();
    loop {
        if events.recv().await.unwrap() == SessionEvent::Finished {
            break;
        }
    }

    // Appliance reports idle slightly after the local countdown finished
    remote.channel.inject(status(ApplianceState::Idle, 0));
    settle().await;
    let view = remote.panel.refresh().await.unwrap();
    assert_eq!(view.appliance, ApplianceState::Idle);
    assert_eq!(view.remaining, 0);
    assert!(view.controls_enabled);
    assert!(!remote.session.is_hosting());
}

#[tokio::test(start_paused = true)]
async fn session_recovers_after_reconnect_without_panel_input() {
    let remote = remote();
    remote.channel.inject(ChannelEvent::Connected);
    remote.channel.inject(status(ApplianceState::Running, 300));
    settle().await;
    remote.panel.refresh().await.unwrap();
    settle().await;
    assert!(remote.session.is_hosting());

    remote.channel.inject(ChannelEvent::Disconnected);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(remote.session.time_remaining(), 240);
    remote.channel.take_sent();

    // Appliance kept going but ran slower than the local clock
    remote.channel.inject(ChannelEvent::Connected);
    settle().await;
    assert_eq!(remote.channel.take_sent(), vec![Command::RequestStatus]);

    remote.channel.inject(status(ApplianceState::Running, 255));
    settle().await;
    remote.panel.refresh().await.unwrap();
    settle().await;
    assert_eq!(remote.session.time_remaining(), 255);
    assert_eq!(remote.panel.view().remaining, 255);
}

#[tokio::test(start_paused = true)]
async fn appliance_stopped_remotely_resets_everything() {
    let remote = remote();
    remote.channel.inject(status(ApplianceState::Running, 600));
    settle().await;
    remote.panel.refresh().await.unwrap();
    settle().await;

    tokio::time::sleep(Duration::from_millis(30_500)).await;
    remote.channel.inject(status(ApplianceState::Idle, 0));
    settle().await;
    let view = remote.panel.refresh().await.unwrap();
    settle().await;

    assert_eq!(view.appliance, ApplianceState::Idle);
    assert_eq!(view.remaining, 0);
    assert_eq!(remote.session.snapshot(), CountdownSnapshot::default());

    let mut events = remote.session.subscribe();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panel_and_session_agree_on_multi_threaded_runtime() {
    for round in 0..50u64 {
        let remote = remote();
        let start = 300 + round;

        remote.channel.inject(ChannelEvent::Connected);
        remote.channel.inject(status(ApplianceState::Running, start));
        view_where(&remote.panel, |v| v.appliance == ApplianceState::Running).await;

        // One correction for a drifted report, however the tasks interleave
        let corrected = start - 60;
        remote.channel.inject(status(ApplianceState::Running, corrected));
        view_where(&remote.panel, |v| v.remaining <= corrected).await;
        let remaining = remote.session.time_remaining();
        assert!(remaining == corrected || remaining == corrected - 1, "{remaining} vs {corrected}");

        let paused = start - 100;
        remote.channel.inject(status(ApplianceState::Pause, paused));
        view_where(&remote.panel, |v| {
            v.appliance == ApplianceState::Pause && v.remaining == paused
        })
        .await;
        assert_eq!(
            remote.session.snapshot(),
            CountdownSnapshot::new(CountdownState::Paused, paused)
        );

        remote.channel.inject(status(ApplianceState::Idle, 0));
        view_where(&remote.panel, |v| v.appliance == ApplianceState::Idle).await;
        assert_eq!(remote.session.snapshot(), CountdownSnapshot::default());
    }
}
