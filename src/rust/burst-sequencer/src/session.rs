// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, Mutex, PoisonError};

use crate::controller::ChannelController;

/// Access to an instrument for the duration of one or more burst sequences.
///
/// When a lock is attached, it is held for each whole sequence, so that sessions
/// sharing the lock never interleave their writes on the instrument.
pub struct HardwareSession<'a> {
    controller: &'a mut dyn ChannelController,
    lock: Option<Arc<Mutex<()>>>,
}

impl<'a> HardwareSession<'a> {
    pub fn new(controller: &'a mut dyn ChannelController) -> Self {
        HardwareSession {
            controller,
            lock: None,
        }
    }

    pub fn with_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn lock(&self) -> Option<&Arc<Mutex<()>>> {
        self.lock.as_ref()
    }

    /// Run `f` against the instrument, holding the session lock if any.
    pub(crate) fn exclusive<T>(&mut self, f: impl FnOnce(&mut dyn ChannelController) -> T) -> T {
        // Poisoning is ignored, the lock guards no data.
        let _guard = self
            .lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));
        f(&mut *self.controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ChannelId, ChannelParameter, HardwareError, ParameterValue};

    struct Idle;

    impl ChannelController for Idle {
        fn configure_channel(
            &mut self,
            _channel: ChannelId,
            _parameter: ChannelParameter,
            _value: ParameterValue,
        ) -> Result<(), HardwareError> {
            Ok(())
        }

        fn query_channel(
            &mut self,
            _channel: ChannelId,
            _parameter: ChannelParameter,
        ) -> Result<ParameterValue, HardwareError> {
            Ok(ParameterValue::Bool(false))
        }

        fn enable_output(&mut self, _channel: ChannelId) -> Result<(), HardwareError> {
            Ok(())
        }

        fn disable_output(&mut self, _channel: ChannelId) -> Result<(), HardwareError> {
            Ok(())
        }
    }

    #[test]
    fn test_lock_is_held_while_exclusive() {
        let lock = Arc::new(Mutex::new(()));
        let mut controller = Idle;
        let mut session = HardwareSession::new(&mut controller).with_lock(Arc::clone(&lock));
        let held = session.exclusive(|_| lock.try_lock().is_err());
        assert!(held);
        assert!(lock.try_lock().is_ok());
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let lock = Arc::new(Mutex::new(()));
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(lock.is_poisoned());
        let mut controller = Idle;
        let mut session = HardwareSession::new(&mut controller).with_lock(lock);
        assert_eq!(session.exclusive(|_| 7), 7);
    }
}
