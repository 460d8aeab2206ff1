//! Syscall gateway
//!
//! Every call that can switch contexts enters the kernel through
//! [`Kernel::syscall`]. On hardware the arguments are marshalled into four
//! machine words, trapped through SVCall and decoded by [`Kernel::dispatch`].

use crate::error::{KernelFault, OsError, OsResult, ReturnCode};
use crate::kernel::Kernel;
use crate::port::Port;
use crate::types::OsTick;

/// Call code carried in the first argument word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CallCode {
    StartOs = 0,
    TaskSleep = 1,
    SwitchContext = 2,
    FatalError = 3,
}

impl TryFrom<usize> for CallCode {
    type Error = KernelFault;

    fn try_from(raw: usize) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(CallCode::StartOs),
            1 => Ok(CallCode::TaskSleep),
            2 => Ok(CallCode::SwitchContext),
            3 => Ok(CallCode::FatalError),
            _ => Err(KernelFault::UnknownSyscall(raw)),
        }
    }
}

/// Decoded kernel call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Syscall {
    /// Arm the ticker and dispatch the first task
    StartOs,
    /// Sleep for this many ticks; 0 yields
    TaskSleep(OsTick),
    /// Give up the CPU to an equal-priority peer
    SwitchContext,
    /// Halt the platform with an application code
    FatalError(usize),
}

impl Syscall {
    pub fn code(self) -> CallCode {
        match self {
            Syscall::StartOs => CallCode::StartOs,
            Syscall::TaskSleep(_) => CallCode::TaskSleep,
            Syscall::SwitchContext => CallCode::SwitchContext,
            Syscall::FatalError(_) => CallCode::FatalError,
        }
    }

    /// Marshal into the four argument words of the trap
    pub fn encode(self) -> [usize; 4] {
        let arg = match self {
            Syscall::TaskSleep(ticks) => ticks as usize,
            Syscall::FatalError(code) => code,
            Syscall::StartOs | Syscall::SwitchContext => 0,
        };
        [self.code() as usize, arg, 0, 0]
    }

    /// Unmarshal trap arguments
    pub fn decode(args: [usize; 4]) -> Result<Self, KernelFault> {
        let call = match CallCode::try_from(args[0])? {
            CallCode::StartOs => Syscall::StartOs,
            CallCode::TaskSleep => {
                Syscall::TaskSleep(OsTick::try_from(args[1]).unwrap_or(OsTick::MAX))
            }
            CallCode::SwitchContext => Syscall::SwitchContext,
            CallCode::FatalError => Syscall::FatalError(args[1]),
        };
        Ok(call)
    }
}

impl<P: Port> Kernel<P> {
    /// Single dispatch point for context-switching calls
    pub fn syscall(&mut self, call: Syscall) -> OsResult<()> {
        crate::trace!("syscall {}", call.code() as u8);
        match call {
            Syscall::StartOs => self.sys_start(),
            Syscall::TaskSleep(ticks) => self.sys_sleep(ticks),
            Syscall::SwitchContext => self.sys_switch(),
            Syscall::FatalError(code) => self.fault(KernelFault::Requested(code)),
        }
    }

    /// Raw gateway entry: decode, run, and report a [`ReturnCode`]
    ///
    /// The error behind a failed call is kept until
    /// [`Kernel::take_syscall_error`] collects it. An unknown call code is
    /// fatal.
    pub fn dispatch(&mut self, args: [usize; 4]) -> usize {
        let call = match Syscall::decode(args) {
            Ok(call) => call,
            Err(fault) => self.fault(fault),
        };
        let result = self.syscall(call);
        self.syscall_error = result.err();
        match result {
            Ok(()) => ReturnCode::SyscallOk as usize,
            Err(err) => err.code() as usize,
        }
    }

    /// Error of the last failed [`Kernel::dispatch`], cleared on read
    #[inline]
    pub fn take_syscall_error(&mut self) -> Option<OsError> {
        self.syscall_error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_codes_follow_header_order() {
        assert_eq!(CallCode::StartOs as usize, 0);
        assert_eq!(CallCode::TaskSleep as usize, 1);
        assert_eq!(CallCode::SwitchContext as usize, 2);
        assert_eq!(CallCode::FatalError as usize, 3);
    }

    #[test]
    fn test_encode_decode() {
        let sleep = Syscall::TaskSleep(42);
        assert_eq!(sleep.encode(), [1, 42, 0, 0]);
        assert_eq!(Syscall::decode(sleep.encode()), Ok(sleep));
        assert_eq!(Syscall::decode([3, 7, 0, 0]), Ok(Syscall::FatalError(7)));
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(
            Syscall::decode([9, 0, 0, 0]),
            Err(KernelFault::UnknownSyscall(9))
        );
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_sleep_saturates() {
        let args = [1, usize::MAX, 0, 0];
        assert_eq!(Syscall::decode(args), Ok(Syscall::TaskSleep(OsTick::MAX)));
    }
}
