use anyhow::Result;
use std::{fs, sync::Arc, thread, time::Duration};
use tankrl_core::{
    dummy::{episode_frames, DummyCodec, DummyPolicy, ScriptedGame},
    record::{CsvRecorder, EpisodeRecord},
    replay_buffer::{SimpleReplayBuffer, SimpleReplayBufferConfig},
    Bridge, Command, ReplayBufferBase, Trainer, TrainerConfig, Transition,
};
use tempdir::TempDir;

#[test]
fn test_training_and_game_threads() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new("two_threads")?;
    let log_dir = dir.path().join("log");
    let model_dir = dir.path().join("model");

    let config = TrainerConfig::default()
        .n_episode(3)
        .max_step(2000)
        .batch_size(4)
        .initial_replay_size(20)
        .save_network(1)
        .step_delay(1)
        .round_delay(5)
        .episode_delay(5)
        .start_poll_interval(10)
        .telemetry_timeout(2000)
        .model_dir(model_dir.to_string_lossy())
        .log_dir(log_dir.to_string_lossy());

    let bridge = Arc::new(Bridge::new(DummyCodec::new(2, 5)));
    let frames = [
        episode_frames(10, &[4], 1),
        episode_frames(12, &[], 2),
        episode_frames(8, &[3, 6], 1),
    ]
    .concat();

    // Telemetry starts after the trainer has begun waiting for the game
    let game = {
        let bridge = bridge.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            ScriptedGame::spawn(bridge, frames, Duration::from_secs(2))
        })
    };

    let training = {
        let bridge = bridge.clone();
        let config = config.clone();
        thread::spawn(move || -> Result<_> {
            let mut trainer = Trainer::build(config.clone())?;
            let mut agent = DummyPolicy::new(5);
            let mut buffer: SimpleReplayBuffer<Transition> =
                SimpleReplayBuffer::build(&SimpleReplayBufferConfig::default().capacity(100));
            let mut recorder = CsvRecorder::new(&config.log_dir)?;
            let summary = trainer.train(bridge.as_ref(), &mut agent, &mut buffer, &mut recorder)?;
            Ok((summary, agent, recorder.path().to_path_buf()))
        })
    };

    let result = training.join().expect("training thread panicked");
    bridge.shutdown();
    let commands = game.join().expect("game thread panicked").join();
    let (summary, agent, log_path) = result?;

    // 10 + 12 + 8 frames, minus one per round end
    assert_eq!(summary.n_episodes, 3);
    assert_eq!(summary.n_steps, 9 + 12 + 6);
    assert_eq!(agent.n_act, summary.n_steps);
    assert_eq!(commands.len(), summary.n_steps);
    assert!(commands
        .iter()
        .all(|c| matches!(c.command, Command::Fire | Command::MoveTo)));

    // Replay starts once the buffer holds 21 transitions, at the last step of the 2nd episode
    assert!(summary.replay_active);
    assert_eq!(agent.replays.first(), Some(&21));
    assert_eq!(agent.replays.len(), summary.n_steps - 20);
    assert_eq!(summary.checkpoints.len(), 2);
    assert!(summary.checkpoints.iter().all(|p| p.starts_with(&model_dir)));
    assert_eq!(agent.n_update_epsilon, 2);

    let content = fs::read_to_string(&log_path)?;
    assert!(content
        .starts_with("Episode,Step,Reward,Total_reward,Action,Epsilon,Done,Termination_Code\n"));
    let mut rdr = csv::Reader::from_path(&log_path)?;
    let records = rdr
        .deserialize::<EpisodeRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(records.len(), summary.n_steps);
    let ends = records.iter().filter(|r| r.done).collect::<Vec<_>>();
    assert_eq!(ends.len(), 3);
    assert_eq!(
        ends.iter()
            .map(|r| (r.episode, r.step, r.termination_code))
            .collect::<Vec<_>>(),
        vec![(1, 9, 1), (2, 12, 2), (3, 6, 1)]
    );
    Ok(())
}
