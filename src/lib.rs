//! Component-agnostic core of a multimedia port runtime.
//!
//! Components own typed ports; clients commit formats, connect ports,
//! enable them and exchange reference counted buffer headers with the
//! component through the send and return paths. Connected ports can be
//! driven by the component itself or by this core through an auto
//! allocated buffer pool.

mod error;
pub use self::error::{Error, ErrorKind, Result};

mod sync;

mod stats;
pub use self::stats::{CorePortStats, CoreStats, StatsDirection};

mod buffer;
pub use self::buffer::{Buffer, BufferFlags, BufferHeader, Payload};

mod pool;
pub use self::pool::{Pool, PoolReleaseCb};

pub mod events;
pub use self::events::{EventData, FormatChangedEvent};

mod params;
pub use self::params::{CoreStatisticsParam, ParamId, Parameter};

mod hooks;
pub use self::hooks::{
    ClientCallback, ConnectHook, DisableHook, EnableHook, FlushHook, ParameterGetHook,
    ParameterSetHook, PayloadAllocHook, PayloadFreeHook, PortHooks, SendHook, SetFormatHook,
};

mod component;
pub use self::component::Component;

mod port;
pub use self::port::{Capabilities, Port, PortConfig, PortType};

pub use format;
