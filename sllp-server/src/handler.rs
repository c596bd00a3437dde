//! Command handlers.

use crate::error::core_error_code;
use bytes::{BufMut, BytesMut};
use sllp_core::{
    CoreError, CurveDef, CurveId, Hook, Operation, Registry, VarId, Variable, VariableDef,
    CURVE_BLOCK_SIZE,
};
use sllp_protocol::{Command, ErrorCode, Message};

/// High bit of a list entry, set for writable entries.
const WRITABLE: u8 = 0x80;

/// Curve id and block index in front of block data.
const CURVE_BLOCK_HEADER: usize = 2;

/// Executes SLLP commands against a registry.
///
/// One handler serves one request at a time: the list of touched variables
/// is reused across calls.
pub struct CommandHandler {
    registry: Registry,
    /// Notified around variable reads and writes.
    hook: Option<Box<dyn Hook>>,
    /// Variables touched by the request being processed.
    touched: Vec<VarId>,
}

impl CommandHandler {
    /// Creates a new command handler.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            hook: None,
            touched: Vec::new(),
        }
    }

    /// Sets the notification hook.
    pub fn with_hook(mut self, hook: impl Hook + 'static) -> Self {
        self.set_hook(hook);
        self
    }

    /// Replaces the notification hook.
    pub fn set_hook(&mut self, hook: impl Hook + 'static) {
        self.hook = Some(Box::new(hook));
    }

    /// Removes the notification hook.
    pub fn clear_hook(&mut self) {
        self.hook = None;
    }

    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers a variable with the underlying registry.
    pub fn register_variable(&mut self, def: VariableDef) -> Result<VarId, CoreError> {
        self.registry.register_variable(def)
    }

    /// Registers a curve with the underlying registry.
    pub fn register_curve(&mut self, def: CurveDef) -> Result<CurveId, CoreError> {
        self.registry.register_curve(def)
    }

    /// Variables touched by the last processed request, in notification
    /// order.
    pub fn touched(&self) -> &[VarId] {
        &self.touched
    }

    /// Processes a raw request packet and returns the raw response packet.
    ///
    /// Never fails: malformed input is answered in-band.
    pub fn process(&mut self, packet: &[u8]) -> BytesMut {
        self.touched.clear();

        let response = match Message::decode(packet) {
            Ok(request) => self.handle(&request),
            Err(e) => {
                tracing::debug!("Malformed packet: {}", e);
                Message::error(ErrorCode::MalformedMessage)
            }
        };

        response.encode()
    }

    /// Handles a decoded request and returns the response.
    pub fn handle(&mut self, request: &Message) -> Message {
        self.touched.clear();

        tracing::debug!(
            "Request: {:#04x} ({} payload bytes)",
            request.code,
            request.payload.len()
        );

        let payload = &request.payload[..];
        let result = match request.command() {
            Some(Command::QueryVarsList) => self.handle_query_vars_list(payload),
            Some(Command::QueryGroupsList) => self.handle_query_groups_list(payload),
            Some(Command::QueryGroup) => self.handle_query_group(payload),
            Some(Command::QueryCurvesList) => self.handle_query_curves_list(payload),
            Some(Command::ReadVar) => self.handle_read_var(payload),
            Some(Command::ReadGroup) => self.handle_read_group(payload),
            Some(Command::WriteVar) => self.handle_write_var(payload),
            Some(Command::WriteGroup) => self.handle_write_group(payload),
            Some(Command::CreateGroup) => self.handle_create_group(payload),
            Some(Command::RemoveAllGroups) => self.handle_remove_all_groups(payload),
            Some(Command::CurveTransmit) => self.handle_curve_transmit(payload),
            Some(Command::CurveBlock) => self.handle_curve_block(payload),
            Some(Command::CurveRecalcCsum) => self.handle_curve_recalc_csum(payload),
            _ => Err(ErrorCode::OpNotSupported),
        };

        match result {
            Ok(response) => {
                tracing::debug!(
                    "Response: {:#04x} ({} payload bytes)",
                    response.code,
                    response.payload.len()
                );
                response
            }
            Err(code) => {
                tracing::debug!("Response: {} for request {:#04x}", code, request.code);
                Message::error(code)
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn handle_query_vars_list(&self, payload: &[u8]) -> Result<Message, ErrorCode> {
        expect_len(payload, 0)?;

        let list: Vec<u8> = self
            .registry
            .variables()
            .iter()
            .map(|var| writable_flag(var.is_writable()) | var.size() as u8)
            .collect();

        Ok(Message::new(Command::VarsList, list))
    }

    fn handle_query_groups_list(&self, payload: &[u8]) -> Result<Message, ErrorCode> {
        expect_len(payload, 0)?;

        let list: Vec<u8> = self
            .registry
            .groups()
            .iter()
            .map(|group| writable_flag(group.is_writable()) | (group.len() as u8 & !WRITABLE))
            .collect();

        Ok(Message::new(Command::GroupsList, list))
    }

    fn handle_query_group(&self, payload: &[u8]) -> Result<Message, ErrorCode> {
        expect_len(payload, 1)?;

        let group = self
            .registry
            .group(payload[0])
            .ok_or(ErrorCode::InvalidId)?;

        Ok(Message::new(Command::Group, group.members().to_vec()))
    }

    fn handle_query_curves_list(&self, payload: &[u8]) -> Result<Message, ErrorCode> {
        expect_len(payload, 0)?;

        let mut list = BytesMut::new();
        for curve in self.registry.curves() {
            list.put_u8(curve.is_writable() as u8);
            list.put_u8(curve.nblocks());
            list.put_slice(curve.checksum());
        }

        Ok(Message::new(Command::CurvesList, list.freeze()))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn handle_read_var(&mut self, payload: &[u8]) -> Result<Message, ErrorCode> {
        expect_len(payload, 1)?;

        let var = self
            .registry
            .variable(payload[0])
            .ok_or(ErrorCode::InvalidId)?;

        self.touched.push(var.id());
        self.notify(Operation::Read);

        let mut value = Vec::with_capacity(var.size());
        var.read_into(&mut value);

        Ok(Message::new(Command::VarReading, value))
    }

    fn handle_read_group(&mut self, payload: &[u8]) -> Result<Message, ErrorCode> {
        expect_len(payload, 1)?;

        let group = self
            .registry
            .group(payload[0])
            .ok_or(ErrorCode::InvalidId)?;

        self.touched.extend_from_slice(group.members());
        self.notify(Operation::Read);

        let mut values = Vec::with_capacity(group.data_size());
        for var in self.registry.members(group) {
            var.read_into(&mut values);
        }

        Ok(Message::new(Command::GroupReading, values))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    fn handle_write_var(&mut self, payload: &[u8]) -> Result<Message, ErrorCode> {
        // One byte for the id, at least one for the value
        expect_min_len(payload, 2)?;

        let var = self
            .registry
            .variable(payload[0])
            .ok_or(ErrorCode::InvalidId)?;

        expect_len(payload, var.size() + 1)?;

        if !var.is_writable() {
            return Err(ErrorCode::ReadOnly);
        }

        var.store(&payload[1..]);

        self.touched.push(var.id());
        self.notify(Operation::Write);

        Ok(Message::ok())
    }

    fn handle_write_group(&mut self, payload: &[u8]) -> Result<Message, ErrorCode> {
        expect_min_len(payload, 2)?;

        let group = self
            .registry
            .group(payload[0])
            .ok_or(ErrorCode::InvalidId)?;

        expect_len(payload, group.data_size() + 1)?;

        if !group.is_writable() {
            return Err(ErrorCode::ReadOnly);
        }

        let mut values = &payload[1..];
        for var in self.registry.members(group) {
            let (value, rest) = values.split_at(var.size());
            var.store(value);
            values = rest;
        }

        self.touched.extend_from_slice(group.members());
        self.notify(Operation::Write);

        Ok(Message::ok())
    }

    // =========================================================================
    // Group management
    // =========================================================================

    fn handle_create_group(&mut self, payload: &[u8]) -> Result<Message, ErrorCode> {
        // At least one member, and no more than there are variables
        expect_min_len(payload, 1)?;
        if payload.len() > self.registry.variables().len() {
            return Err(ErrorCode::InvalidPayloadSize);
        }

        let group = self.registry.create_group(payload).map_err(|e| {
            tracing::debug!("Group creation rejected: {}", e);
            core_error_code(&e)
        })?;

        let answer = writable_flag(group.is_writable()) | group.id();
        Ok(Message::new(Command::GroupCreated, vec![answer]))
    }

    fn handle_remove_all_groups(&mut self, payload: &[u8]) -> Result<Message, ErrorCode> {
        expect_len(payload, 0)?;

        let removed = self.registry.remove_user_groups();
        tracing::debug!("Removed {} user groups", removed);

        Ok(Message::ok())
    }

    // =========================================================================
    // Curves
    // =========================================================================

    fn handle_curve_transmit(&mut self, payload: &[u8]) -> Result<Message, ErrorCode> {
        expect_len(payload, CURVE_BLOCK_HEADER)?;

        let (id, block) = (payload[0], payload[1]);
        let curve = self
            .registry
            .curve_mut(id)
            .ok_or(ErrorCode::InvalidId)?;

        if !curve.has_block(block) {
            return Err(ErrorCode::InvalidValue);
        }

        let mut answer = BytesMut::zeroed(CURVE_BLOCK_HEADER + CURVE_BLOCK_SIZE);
        answer[0] = id;
        answer[1] = block;
        curve
            .read_block(block, &mut answer[CURVE_BLOCK_HEADER..])
            .map_err(|e| {
                tracing::warn!("Reading block {} of curve {} failed: {}", block, id, e);
                ErrorCode::Internal
            })?;

        Ok(Message::new(Command::CurveBlock, answer.freeze()))
    }

    fn handle_curve_block(&mut self, payload: &[u8]) -> Result<Message, ErrorCode> {
        expect_len(payload, CURVE_BLOCK_HEADER + CURVE_BLOCK_SIZE)?;

        let (id, block) = (payload[0], payload[1]);
        let curve = self
            .registry
            .curve_mut(id)
            .ok_or(ErrorCode::InvalidId)?;

        if !curve.has_block(block) {
            return Err(ErrorCode::InvalidValue);
        }

        if !curve.is_writable() {
            return Err(ErrorCode::ReadOnly);
        }

        curve
            .write_block(block, &payload[CURVE_BLOCK_HEADER..])
            .map_err(|e| {
                tracing::warn!("Writing block {} of curve {} failed: {}", block, id, e);
                ErrorCode::Internal
            })?;

        Ok(Message::ok())
    }

    fn handle_curve_recalc_csum(&mut self, payload: &[u8]) -> Result<Message, ErrorCode> {
        expect_len(payload, 1)?;

        let id = payload[0];
        let curve = self
            .registry
            .curve_mut(id)
            .ok_or(ErrorCode::InvalidId)?;

        let checksum = curve.recalc_checksum().map_err(|e| {
            tracing::warn!("Checksum of curve {} failed: {}", id, e);
            ErrorCode::Internal
        })?;
        tracing::debug!("Curve {} checksum: {}", id, hex::encode(checksum));

        Ok(Message::ok())
    }

    /// Passes the touched variables to the hook, if one is set.
    fn notify(&self, op: Operation) {
        if let Some(hook) = &self.hook {
            let variables: Vec<&Variable> = self
                .touched
                .iter()
                .filter_map(|&id| self.registry.variable(id))
                .collect();
            hook.notify(op, &variables);
        }
    }
}

fn expect_len(payload: &[u8], len: usize) -> Result<(), ErrorCode> {
    if payload.len() == len {
        Ok(())
    } else {
        Err(ErrorCode::InvalidPayloadSize)
    }
}

fn expect_min_len(payload: &[u8], min: usize) -> Result<(), ErrorCode> {
    if payload.len() >= min {
        Ok(())
    } else {
        Err(ErrorCode::InvalidPayloadSize)
    }
}

fn writable_flag(writable: bool) -> u8 {
    if writable {
        WRITABLE
    } else {
        0
    }
}
