use crate::{error::TankRlError, ControlCommand, ControlSink, EnvCodec, Frame};
use anyhow::Result;
use log::{debug, info};
use serde_json::Value;
use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

/// State shared between the network task and the training loop.
struct Slot<X> {
    /// The latest raw telemetry.
    payload: Option<Value>,

    /// The latest decoded frame.
    frame: Option<Frame<X>>,

    /// `frame` has not been taken yet.
    ready: bool,

    /// Latched when a frame reports that the game has started.
    started: bool,

    shutdown: bool,

    /// The number of frames ingested so far.
    n_frames: u64,
}

impl<X> Default for Slot<X> {
    fn default() -> Self {
        Self {
            payload: None,
            frame: None,
            ready: false,
            started: false,
            shutdown: false,
            n_frames: 0,
        }
    }
}

/// Presents the push-based telemetry stream as a pull-based state source.
///
/// All fields are guarded by a single mutex, so the training loop never
/// observes a half-updated frame. A condition variable wakes up waiters
/// when a frame arrives or when the bridge is shut down.
///
/// There is exactly one producer, the transport calling [`Bridge::ingest`],
/// and one consumer, the [`Trainer`](crate::Trainer).
pub struct Bridge<C: EnvCodec> {
    codec: C,
    slot: Mutex<Slot<C::Context>>,
    cond: Condvar,
    sink: Mutex<Option<Arc<dyn ControlSink>>>,
}

impl<C: EnvCodec> Bridge<C> {
    /// Constructs a bridge decoding telemetry with `codec`.
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            slot: Mutex::new(Slot::default()),
            cond: Condvar::new(),
            sink: Mutex::new(None),
        }
    }

    /// The codec of this bridge.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Installs the sink through which [`Bridge::send_action`] reaches the game client.
    pub fn set_control_sink(&self, sink: Arc<dyn ControlSink>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    fn lock(&self) -> MutexGuard<'_, Slot<C::Context>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits on the condition variable until `deadline`.
    ///
    /// Returns the guard and `false` if the deadline has passed.
    fn wait_until<'a>(
        &self,
        slot: MutexGuard<'a, Slot<C::Context>>,
        deadline: Instant,
    ) -> (MutexGuard<'a, Slot<C::Context>>, bool) {
        let now = Instant::now();
        if now >= deadline {
            return (slot, false);
        }
        let (slot, _) = self
            .cond
            .wait_timeout(slot, deadline - now)
            .unwrap_or_else(PoisonError::into_inner);
        (slot, true)
    }

    fn take_locked(slot: &mut Slot<C::Context>) -> Result<Frame<C::Context>> {
        match (&slot.frame, slot.ready) {
            (Some(frame), true) => {
                slot.ready = false;
                Ok(frame.clone())
            }
            _ => Err(TankRlError::NotReady.into()),
        }
    }

    /// Decodes a telemetry payload and stores it as the latest frame.
    ///
    /// An unread frame is overwritten. If the payload cannot be decoded, the
    /// stored frame is left untouched and the error is returned.
    pub fn ingest(&self, payload: Value) -> Result<()> {
        let frame = self.codec.decode(&payload)?;
        {
            let mut slot = self.lock();
            if frame.is_started && !slot.started {
                info!("Game started");
            }
            if slot.ready {
                debug!("Overwrite unread frame {}", slot.n_frames);
            }
            slot.started |= frame.is_started;
            slot.frame = Some(frame);
            slot.payload = Some(payload);
            slot.ready = true;
            slot.n_frames += 1;
        }
        self.cond.notify_all();
        Ok(())
    }

    /// Returns `true` if a frame is waiting to be taken.
    pub fn poll_ready(&self) -> bool {
        self.lock().ready
    }

    /// Takes the latest decoded state, clearing the ready flag.
    ///
    /// Fails with [`TankRlError::NotReady`] if no new frame has been ingested
    /// since the last take.
    pub fn take_state(&self) -> Result<Vec<f32>> {
        Ok(self.take_frame()?.state)
    }

    /// Takes the latest frame, clearing the ready flag.
    ///
    /// The state, reward and flags of the returned frame belong to the same
    /// telemetry payload.
    pub fn take_frame(&self) -> Result<Frame<C::Context>> {
        Self::take_locked(&mut self.lock())
    }

    /// Discards the frame waiting to be taken, if any.
    pub fn reset_frame(&self) {
        self.lock().ready = false;
    }

    /// Waits up to `timeout` for a new frame and takes it.
    ///
    /// Fails with [`TankRlError::TelemetryTimeout`] when no frame arrives in
    /// time and with [`TankRlError::Shutdown`] if the bridge is shut down.
    pub fn wait_frame(&self, timeout: Duration) -> Result<Frame<C::Context>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if slot.shutdown {
                return Err(TankRlError::Shutdown.into());
            }
            if slot.ready {
                return Self::take_locked(&mut slot);
            }
            let (guard, waiting) = self.wait_until(slot, deadline);
            if !waiting {
                return Err(TankRlError::TelemetryTimeout(timeout).into());
            }
            slot = guard;
        }
    }

    /// Waits up to `timeout` for a new state and takes it.
    pub fn wait_state(&self, timeout: Duration) -> Result<Vec<f32>> {
        Ok(self.wait_frame(timeout)?.state)
    }

    /// If the latest telemetry expects a control response before more telemetry is sent.
    pub fn get_action_request(&self) -> bool {
        self.lock()
            .frame
            .as_ref()
            .map_or(false, |f| f.action_request)
    }

    /// Decodes an action index with the context of the latest frame.
    pub fn decode_action(&self, index: usize) -> Result<ControlCommand> {
        let slot = self.lock();
        let frame = slot.frame.as_ref().ok_or(TankRlError::NotReady)?;
        self.codec.decode_action(index, &frame.context)
    }

    /// Forwards a command to the game client.
    ///
    /// Any frame not taken yet was produced before this command, so it is
    /// discarded: the next frame taken reflects the command. The slot stays
    /// locked until the command is emitted, so a frame ingested meanwhile
    /// waits and is not discarded.
    pub fn send_action(&self, command: &ControlCommand) -> Result<()> {
        let sink = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(TankRlError::NoControlSink)?;
        let mut slot = self.lock();
        slot.ready = false;
        sink.emit_control(command)
    }

    /// If the latest frame ended a round.
    pub fn check_round_end(&self) -> bool {
        self.lock()
            .frame
            .as_ref()
            .map_or(false, |f| f.is_round_end)
    }

    /// If the latest frame ended the episode.
    pub fn check_episode_end(&self) -> bool {
        self.lock()
            .frame
            .as_ref()
            .map_or(false, |f| f.is_episode_end)
    }

    /// Termination code of the latest frame.
    pub fn termination_code(&self) -> i32 {
        self.lock().frame.as_ref().map_or(0, |f| f.termination_code)
    }

    /// Reward of the latest frame.
    pub fn reward(&self) -> f32 {
        self.lock().frame.as_ref().map_or(0.0, |f| f.reward)
    }

    /// If any frame has reported that the game started.
    pub fn is_game_started(&self) -> bool {
        self.lock().started
    }

    /// Waits up to `timeout` for the game to start.
    ///
    /// Returns `false` on timeout and fails with [`TankRlError::Shutdown`]
    /// if the bridge is shut down.
    pub fn wait_game_started(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if slot.shutdown {
                return Err(TankRlError::Shutdown.into());
            }
            if slot.started {
                return Ok(true);
            }
            let (guard, waiting) = self.wait_until(slot, deadline);
            if !waiting {
                return Ok(false);
            }
            slot = guard;
        }
    }

    /// Sleeps for `duration`, returning early with [`TankRlError::Shutdown`]
    /// if the bridge is shut down.
    pub fn pause(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        let mut slot = self.lock();
        loop {
            if slot.shutdown {
                return Err(TankRlError::Shutdown.into());
            }
            let (guard, waiting) = self.wait_until(slot, deadline);
            if !waiting {
                return Ok(());
            }
            slot = guard;
        }
    }

    /// The latest raw telemetry payload.
    pub fn payload(&self) -> Option<Value> {
        self.lock().payload.clone()
    }

    /// The number of frames ingested so far.
    pub fn n_frames(&self) -> u64 {
        self.lock().n_frames
    }

    /// Stops the bridge, waking up every waiter.
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.cond.notify_all();
        info!("Environment bridge shut down");
    }

    /// If [`Bridge::shutdown`] has been called.
    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{frame_json, ChannelSink, DummyCodec},
        Command,
    };
    use serde_json::json;
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
    };

    fn is_err(err: &anyhow::Error, f: impl Fn(&TankRlError) -> bool) -> bool {
        err.downcast_ref::<TankRlError>().map_or(false, f)
    }

    #[test]
    fn test_take_after_ingest() -> Result<()> {
        let bridge = Bridge::new(DummyCodec::new(2, 5));
        assert!(!bridge.poll_ready());
        let err = bridge.take_state().unwrap_err();
        assert!(is_err(&err, |e| matches!(e, TankRlError::NotReady)));

        bridge.ingest(frame_json(&[1.0, 2.0], 0.5))?;
        assert!(bridge.poll_ready());
        assert_eq!(bridge.take_state()?, vec![1.0, 2.0]);
        assert!(!bridge.poll_ready());

        // The same state is never handed out twice
        let err = bridge.take_state().unwrap_err();
        assert!(is_err(&err, |e| matches!(e, TankRlError::NotReady)));
        Ok(())
    }

    #[test]
    fn test_unread_frame_is_overwritten() -> Result<()> {
        let bridge = Bridge::new(DummyCodec::new(1, 5));
        bridge.ingest(frame_json(&[1.0], 0.0))?;
        bridge.ingest(frame_json(&[2.0], 0.0))?;
        assert_eq!(bridge.n_frames(), 2);
        assert_eq!(bridge.take_state()?, vec![2.0]);
        assert!(bridge.take_state().is_err());

        bridge.ingest(frame_json(&[3.0], 0.0))?;
        bridge.reset_frame();
        assert!(!bridge.poll_ready());
        Ok(())
    }

    #[test]
    fn test_bad_payload_keeps_frame() -> Result<()> {
        let bridge = Bridge::new(DummyCodec::new(2, 5));
        bridge.ingest(frame_json(&[1.0, 2.0], 0.0))?;
        let err = bridge.ingest(json!({"state": "garbage"})).unwrap_err();
        assert!(is_err(&err, |e| matches!(e, TankRlError::Codec(_))));
        assert_eq!(bridge.n_frames(), 1);
        assert_eq!(bridge.take_state()?, vec![1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_flags_follow_latest_frame() -> Result<()> {
        let bridge = Bridge::new(DummyCodec::new(1, 5));
        assert!(!bridge.is_game_started());
        assert!(!bridge.get_action_request());

        let mut payload = frame_json(&[0.0], 1.5);
        payload["round_end"] = json!(true);
        payload["game_end"] = json!(true);
        payload["termination_code"] = json!(3);
        bridge.ingest(payload)?;
        assert!(bridge.is_game_started());
        assert!(bridge.get_action_request());
        assert!(bridge.check_round_end());
        assert!(bridge.check_episode_end());
        assert_eq!(bridge.termination_code(), 3);
        assert_eq!(bridge.reward(), 1.5);

        let mut payload = frame_json(&[0.0], 0.0);
        payload["started"] = json!(false);
        bridge.ingest(payload)?;
        assert!(!bridge.check_round_end());
        assert!(!bridge.check_episode_end());
        // Game start is latched
        assert!(bridge.is_game_started());
        assert_eq!(
            bridge.payload().map(|p| p["started"].clone()),
            Some(json!(false))
        );
        Ok(())
    }

    #[test]
    fn test_wait_state_times_out() {
        let bridge = Bridge::new(DummyCodec::new(1, 5));
        let timer = Instant::now();
        let err = bridge.wait_state(Duration::from_millis(50)).unwrap_err();
        assert!(timer.elapsed() >= Duration::from_millis(50));
        assert!(is_err(&err, |e| matches!(e, TankRlError::TelemetryTimeout(_))));
    }

    #[test]
    fn test_wait_state_wakes_on_ingest() -> Result<()> {
        let bridge = Arc::new(Bridge::new(DummyCodec::new(1, 5)));
        let producer = {
            let bridge = bridge.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                bridge.ingest(frame_json(&[7.0], 0.0))
            })
        };
        assert_eq!(bridge.wait_state(Duration::from_secs(5))?, vec![7.0]);
        producer.join().expect("producer panicked")?;
        Ok(())
    }

    #[test]
    fn test_shutdown_wakes_waiters() {
        let bridge = Arc::new(Bridge::new(DummyCodec::new(1, 5)));
        let waiter = {
            let bridge = bridge.clone();
            thread::spawn(move || bridge.wait_state(Duration::from_secs(30)))
        };
        let sleeper = {
            let bridge = bridge.clone();
            thread::spawn(move || bridge.pause(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(20));
        bridge.shutdown();

        let err = waiter.join().expect("waiter panicked").unwrap_err();
        assert!(is_err(&err, |e| matches!(e, TankRlError::Shutdown)));
        let err = sleeper.join().expect("sleeper panicked").unwrap_err();
        assert!(is_err(&err, |e| matches!(e, TankRlError::Shutdown)));
        assert!(bridge.is_shutdown());
        let err = bridge.wait_game_started(Duration::from_secs(1)).unwrap_err();
        assert!(is_err(&err, |e| matches!(e, TankRlError::Shutdown)));
    }

    #[test]
    fn test_wait_game_started() -> Result<()> {
        let bridge = Arc::new(Bridge::new(DummyCodec::new(1, 5)));
        assert!(!bridge.wait_game_started(Duration::from_millis(10))?);

        let producer = {
            let bridge = bridge.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                bridge.ingest(frame_json(&[0.0], 0.0))
            })
        };
        assert!(bridge.wait_game_started(Duration::from_secs(5))?);
        producer.join().expect("producer panicked")?;
        Ok(())
    }

    #[test]
    fn test_send_action_discards_stale_frame() -> Result<()> {
        let bridge = Bridge::new(DummyCodec::new(1, 5));
        let command = ControlCommand::new(Command::Fire, (1, 2));
        let err = bridge.send_action(&command).unwrap_err();
        assert!(is_err(&err, |e| matches!(e, TankRlError::NoControlSink)));

        let (sink, rx) = ChannelSink::channel();
        bridge.set_control_sink(Arc::new(sink));
        bridge.ingest(frame_json(&[0.0], 0.0))?;
        let command = bridge.decode_action(0)?;
        bridge.send_action(&command)?;
        assert!(!bridge.poll_ready());
        assert_eq!(rx.try_recv()?, command);
        assert_eq!(command, ControlCommand::new(Command::Fire, (0, 0)));
        Ok(())
    }

    /// Wakes a client thread, then takes a while to deliver the command.
    struct SlowSink {
        wake: crossbeam_channel::Sender<()>,
        emitted: Arc<AtomicBool>,
    }

    impl ControlSink for SlowSink {
        fn emit_control(&self, _command: &ControlCommand) -> Result<()> {
            let _ = self.wake.send(());
            thread::sleep(Duration::from_millis(50));
            self.emitted.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_frame_during_send_follows_command() -> Result<()> {
        let bridge = Arc::new(Bridge::new(DummyCodec::new(1, 5)));
        let (wake, woken) = crossbeam_channel::unbounded();
        let emitted = Arc::new(AtomicBool::new(false));
        bridge.set_control_sink(Arc::new(SlowSink {
            wake,
            emitted: emitted.clone(),
        }));
        bridge.ingest(frame_json(&[1.0], 0.0))?;

        let client = {
            let bridge = bridge.clone();
            let emitted = emitted.clone();
            thread::spawn(move || -> Result<bool> {
                woken.recv_timeout(Duration::from_secs(5))?;
                bridge.ingest(frame_json(&[2.0], 0.0))?;
                Ok(emitted.load(Ordering::SeqCst))
            })
        };
        let command = bridge.decode_action(0)?;
        bridge.send_action(&command)?;

        // The frame sent while the command was in flight lands after it
        assert!(client.join().expect("client panicked")?);
        assert_eq!(bridge.wait_state(Duration::from_secs(1))?, vec![2.0]);
        Ok(())
    }

    #[test]
    fn test_concurrent_handoff() -> Result<()> {
        let n_frames = 2000;
        let bridge = Arc::new(Bridge::new(DummyCodec::new(2, 5)));
        let producer = {
            let bridge = bridge.clone();
            thread::spawn(move || -> Result<()> {
                for i in 1..=n_frames {
                    let v = i as f32;
                    bridge.ingest(frame_json(&[v, -v], v))?;
                }
                Ok(())
            })
        };

        let mut last = 0.0;
        loop {
            match bridge.wait_frame(Duration::from_millis(200)) {
                Ok(frame) => {
                    // Never torn, never handed out twice
                    assert_eq!(frame.state[0], -frame.state[1]);
                    assert_eq!(frame.state[0], frame.reward);
                    assert!(frame.state[0] > last);
                    last = frame.state[0];
                }
                Err(_) => break,
            }
        }
        producer.join().expect("producer panicked")?;
        assert_eq!(last, n_frames as f32);
        Ok(())
    }
}
