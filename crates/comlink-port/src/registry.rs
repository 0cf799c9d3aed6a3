use comlink_frame::{interface::is_valid_interface, Message, NUM_INTERFACES};

use crate::error::{PortError, Result};
use crate::port::Outbox;

/// Handler bound to one interface.
pub type InterfaceCallback = Box<dyn FnMut(&Message, &mut Outbox<'_>)>;

/// Fixed table of interface handlers, indexed by interface id.
pub struct InterfaceRegistry {
    slots: [Option<InterfaceCallback>; NUM_INTERFACES],
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Bind `callback` to `interface`.
    ///
    /// Fails if the id is out of range or the interface already has a
    /// handler; the existing handler stays in place.
    pub fn register<F>(&mut self, interface: u8, callback: F) -> Result<()>
    where
        F: FnMut(&Message, &mut Outbox<'_>) + 'static,
    {
        let slot = self.slot_mut(interface)?;
        if slot.is_some() {
            return Err(PortError::InterfaceInUse(interface));
        }
        *slot = Some(Box::new(callback));
        Ok(())
    }

    /// Remove the handler bound to `interface`.
    pub fn unregister(&mut self, interface: u8) -> Result<()> {
        self.slot_mut(interface)?
            .take()
            .map(|_| ())
            .ok_or(PortError::InterfaceNotEnabled(interface))
    }

    pub fn is_enabled(&self, interface: u8) -> bool {
        self.slots
            .get(usize::from(interface))
            .is_some_and(Option::is_some)
    }

    /// Ids with a bound handler, in ascending order.
    pub fn enabled(&self) -> impl Iterator<Item = u8> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(id, _)| id as u8)
    }

    pub(crate) fn get_mut(&mut self, interface: u8) -> Option<&mut InterfaceCallback> {
        self.slots.get_mut(usize::from(interface))?.as_mut()
    }

    fn slot_mut(&mut self, interface: u8) -> Result<&mut Option<InterfaceCallback>> {
        if !is_valid_interface(interface) {
            return Err(PortError::InvalidInterface(interface));
        }
        Ok(&mut self.slots[usize::from(interface)])
    }
}

impl Default for InterfaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InterfaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceRegistry")
            .field("enabled", &self.enabled().collect::<Vec<_>>())
            .finish()
    }
}
