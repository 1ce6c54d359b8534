use core::fmt;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ErrorKind, Result};
use crate::events::{self, EventData};
use crate::pool::Pool;
use crate::port::{Port, PortType};
use crate::sync::lock;

/// Default number of event buffers available per component.
const EVENT_BUFFERS: u32 = 4;

/// The owner of a set of ports.
///
/// The component holds the port arrays, the event pool every event buffer
/// is drawn from, and the action lock that serialises port teardown against
/// the component's processing thread. Ports refer back to their component
/// through a non-owning handle.
pub struct Component {
    name: String,
    action: Mutex<()>,
    event_pool: Arc<Pool>,
    control: Mutex<Vec<Arc<Port>>>,
    inputs: Mutex<Vec<Arc<Port>>>,
    outputs: Mutex<Vec<Arc<Port>>>,
}

impl Component {
    /// Create a component with the default event pool.
    pub fn new(name: impl Into<String>) -> Result<Arc<Component>> {
        Self::with_event_pool(name, EVENT_BUFFERS, events::FORMAT_CHANGED_EVENT_SIZE)
    }

    /// Create a component with a specific event pool geometry.
    pub fn with_event_pool(
        name: impl Into<String>,
        event_buffers: u32,
        event_buffer_size: u32,
    ) -> Result<Arc<Component>> {
        Ok(Arc::new(Component {
            name: name.into(),
            action: Mutex::new(()),
            event_pool: Pool::new(event_buffers, event_buffer_size)?,
            control: Mutex::new(Vec::new()),
            inputs: Mutex::new(Vec::new()),
            outputs: Mutex::new(Vec::new()),
        }))
    }

    /// The name of the component.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serialise against the component's processing thread.
    ///
    /// Held by the core across the disable hook; component worker code
    /// takes it around its own processing sections.
    #[inline]
    pub fn action_lock(&self) -> MutexGuard<'_, ()> {
        lock(&self.action)
    }

    /// The pool event buffers are drawn from.
    #[inline]
    pub(crate) fn event_pool(&self) -> &Arc<Pool> {
        &self.event_pool
    }

    /// The control ports of the component.
    pub fn control_ports(&self) -> Vec<Arc<Port>> {
        lock(&self.control).clone()
    }

    /// The input ports of the component.
    pub fn input_ports(&self) -> Vec<Arc<Port>> {
        lock(&self.inputs).clone()
    }

    /// The output ports of the component.
    pub fn output_ports(&self) -> Vec<Arc<Port>> {
        lock(&self.outputs).clone()
    }

    /// Add a freshly allocated port, returning its index within the array
    /// for its type.
    pub(crate) fn register(&self, port: &Arc<Port>) -> u32 {
        let array = match port.port_type() {
            PortType::Control => &self.control,
            PortType::Input => &self.inputs,
            PortType::Output => &self.outputs,
        };

        let mut array = lock(array);
        array.push(Arc::clone(port));
        (array.len() - 1) as u32
    }

    /// Report an asynchronous component error to the client through the
    /// first control port.
    pub fn event_error_send(&self, kind: ErrorKind) -> Result<()> {
        let Some(control) = self.control_ports().into_iter().next() else {
            tracing::error!(component = self.name, ?kind, "error event lost, no control port");
            return Err(ErrorKind::Invalid.into());
        };

        let buffer = control.event_get(events::ERROR)?;
        buffer.set_event(Some(EventData::Error(kind)));
        control.event_send(&buffer);
        Ok(())
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("control", &lock(&self.control).len())
            .field("inputs", &lock(&self.inputs).len())
            .field("outputs", &lock(&self.outputs).len())
            .finish()
    }
}
