use core::fmt;

use std::sync::Arc;

use crate::buffer::Buffer;
use crate::error::Result;
use crate::params::Parameter;
use crate::port::{Port, PortConfig};

/// Client supplied callback receiving returned buffer headers.
pub type ClientCallback = Arc<dyn Fn(&Arc<Port>, &Buffer) + Send + Sync>;

/// Commit the format currently set on the port.
pub type SetFormatHook = Arc<dyn Fn(&Arc<Port>, &mut PortConfig) -> Result<()> + Send + Sync>;

/// Start processing on the port.
pub type EnableHook =
    Arc<dyn Fn(&Arc<Port>, &mut PortConfig, Option<&ClientCallback>) -> Result<()> + Send + Sync>;

/// Stop processing and flush every buffer back through the return path.
pub type DisableHook = Arc<dyn Fn(&Arc<Port>, &mut PortConfig) -> Result<()> + Send + Sync>;

/// Return all queued buffers without processing them.
pub type FlushHook = Arc<dyn Fn(&Arc<Port>) -> Result<()> + Send + Sync>;

/// Hand a buffer to the component for processing.
pub type SendHook = Arc<dyn Fn(&Arc<Port>, &Buffer) -> Result<()> + Send + Sync>;

/// Apply a component parameter.
pub type ParameterSetHook =
    Arc<dyn Fn(&Arc<Port>, &mut PortConfig, &dyn Parameter) -> Result<()> + Send + Sync>;

/// Read a component parameter.
pub type ParameterGetHook =
    Arc<dyn Fn(&Arc<Port>, &mut PortConfig, &mut dyn Parameter) -> Result<()> + Send + Sync>;

/// Set up (peer present) or tear down (peer absent) a connection.
pub type ConnectHook = Arc<dyn Fn(&Arc<Port>, Option<&Arc<Port>>) -> Result<()> + Send + Sync>;

/// Allocate payload memory on behalf of the port.
pub type PayloadAllocHook = Arc<dyn Fn(&Arc<Port>, u32) -> Option<Box<[u8]>> + Send + Sync>;

/// Release payload memory obtained from [`PayloadAllocHook`].
pub type PayloadFreeHook = Arc<dyn Fn(&Arc<Port>, Box<[u8]>) + Send + Sync>;

/// The operations a component implements for one of its ports.
///
/// Every field is independently optional; an operation whose hook is absent
/// reports [`NotImplemented`][crate::ErrorKind::NotImplemented]. Hooks that
/// receive a [`PortConfig`] run while the port lock is held.
#[derive(Default, Clone)]
pub struct PortHooks {
    pub set_format: Option<SetFormatHook>,
    pub enable: Option<EnableHook>,
    pub disable: Option<DisableHook>,
    pub flush: Option<FlushHook>,
    pub send: Option<SendHook>,
    pub parameter_set: Option<ParameterSetHook>,
    pub parameter_get: Option<ParameterGetHook>,
    /// Deciding hook for connections: `Ok` means the component drives the
    /// link itself. Absent, or returning any error, hands the connection to
    /// the core.
    pub connect: Option<ConnectHook>,
    pub payload_alloc: Option<PayloadAllocHook>,
    pub payload_free: Option<PayloadFreeHook>,
}

impl fmt::Debug for PortHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortHooks")
            .field("set_format", &self.set_format.is_some())
            .field("enable", &self.enable.is_some())
            .field("disable", &self.disable.is_some())
            .field("flush", &self.flush.is_some())
            .field("send", &self.send.is_some())
            .field("parameter_set", &self.parameter_set.is_some())
            .field("parameter_get", &self.parameter_get.is_some())
            .field("connect", &self.connect.is_some())
            .field("payload_alloc", &self.payload_alloc.is_some())
            .field("payload_free", &self.payload_free.is_some())
            .finish()
    }
}
