/*
    fleetbus
    A control and telemetry gateway for Modbus/TCP VFD fleets.

    Copyright (c) 2026 fleetbus contributors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    modbus.rs

    Minimal Modbus/TCP wire encoding: MBAP framing plus the three function
    codes this gateway ever issues -- read holding registers (03), read
    input registers (04), write single register (06). Word order is
    big-endian throughout, per the wire protocol in use on the fleet.
*/

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::GatewayError;

const FC_READ_HOLDING: u8 = 0x03;
const FC_READ_INPUT: u8 = 0x04;
const FC_WRITE_SINGLE: u8 = 0x06;
const MBAP_HEADER_LEN: usize = 7;

/// One Modbus/TCP connection. Framing and function-code encoding live
/// here; the `Session` above this owns the mutex that serializes exchanges.
pub struct ModbusTransport {
    stream: TcpStream,
    unit: u8,
    next_transaction_id: u16,
}

impl ModbusTransport {
    pub fn connect(ip: std::net::IpAddr, port: u16, unit: u8, timeout: Duration) -> Result<Self, GatewayError> {
        let addr = std::net::SocketAddr::new(ip, port);
        let stream = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| GatewayError::Transport(format!("connect {addr}: {e}")))?;
        stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        stream
            .set_write_timeout(Some(timeout))
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(ModbusTransport { stream, unit, next_transaction_id: 0 })
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), GatewayError> {
        self.stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        self.stream
            .set_write_timeout(Some(timeout))
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(())
    }

    fn next_txn(&mut self) -> u16 {
        let id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);
        id
    }

    fn exchange(&mut self, function: u8, payload: &[u8]) -> Result<Vec<u8>, GatewayError> {
        let txn = self.next_txn();
        let mut request = Vec::with_capacity(MBAP_HEADER_LEN + 1 + payload.len());
        request.extend_from_slice(&txn.to_be_bytes());
        request.extend_from_slice(&0u16.to_be_bytes()); // protocol id
        let length = (1 + 1 + payload.len()) as u16; // unit + function + payload
        request.extend_from_slice(&length.to_be_bytes());
        request.push(self.unit);
        request.push(function);
        request.extend_from_slice(payload);

        self.stream
            .write_all(&request)
            .map_err(|e| GatewayError::Transport(format!("write: {e}")))?;

        let mut header = [0u8; MBAP_HEADER_LEN];
        self.stream
            .read_exact(&mut header)
            .map_err(|e| GatewayError::Transport(format!("read header: {e}")))?;
        let resp_txn = u16::from_be_bytes([header[0], header[1]]);
        if resp_txn != txn {
            return Err(GatewayError::Transport(format!(
                "transaction id mismatch: sent {txn}, got {resp_txn}"
            )));
        }
        let resp_length = u16::from_be_bytes([header[4], header[5]]) as usize;
        if resp_length == 0 {
            return Err(GatewayError::Transport("short response".into()));
        }
        let pdu_len = resp_length - 1; // exclude the unit id already in the header
        let mut pdu = vec![0u8; pdu_len];
        self.stream
            .read_exact(&mut pdu)
            .map_err(|e| GatewayError::Transport(format!("read pdu: {e}")))?;

        let resp_function = *pdu.first().ok_or_else(|| GatewayError::Transport("short response".into()))?;
        if resp_function == function | 0x80 {
            let code = pdu.get(1).copied().unwrap_or(0);
            return Err(GatewayError::Transport(format!("exception response, code {code}")));
        }
        if resp_function != function {
            return Err(GatewayError::Transport(format!(
                "unexpected function code {resp_function:#x}, wanted {function:#x}"
            )));
        }
        Ok(pdu[1..].to_vec())
    }

    fn read_registers(&mut self, function: u8, address: u16, quantity: u16) -> Result<Vec<u16>, GatewayError> {
        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&address.to_be_bytes());
        payload.extend_from_slice(&quantity.to_be_bytes());
        let data = self.exchange(function, &payload)?;
        let byte_count = *data.first().ok_or_else(|| GatewayError::Transport("short response".into()))? as usize;
        let words = &data.get(1..).ok_or_else(|| GatewayError::Transport("short response".into()))?;
        if words.len() < byte_count || byte_count != quantity as usize * 2 {
            return Err(GatewayError::Transport("register byte count mismatch".into()));
        }
        Ok(words.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect())
    }

    pub fn read_holding_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>, GatewayError> {
        self.read_registers(FC_READ_HOLDING, address, quantity)
    }

    pub fn read_input_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>, GatewayError> {
        self.read_registers(FC_READ_INPUT, address, quantity)
    }

    pub fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), GatewayError> {
        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&address.to_be_bytes());
        payload.extend_from_slice(&value.to_be_bytes());
        self.exchange(FC_WRITE_SINGLE, &payload)?;
        Ok(())
    }
}
