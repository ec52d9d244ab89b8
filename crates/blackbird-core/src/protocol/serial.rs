//! Serial port handling
//!
//! Opens the RS-232 link to the matrix: 9600 baud, 8 data bits, no parity,
//! one stop bit.

use serialport::SerialPort;
use std::time::Duration;

use super::ProtocolError;

/// Open a serial port configured for the matrix
pub fn open_port(
    name: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, ProtocolError> {
    let mut port = serialport::new(name, baud_rate)
        .timeout(timeout)
        .open()
        .map_err(|e| ProtocolError::SerialError(format!("{}: {}", name, e)))?;
    configure_port(port.as_mut())?;
    clear_buffers(port.as_mut())?;
    tracing::info!(port = name, baud_rate, "Serial port opened");
    Ok(port)
}

/// Configure a serial port for matrix communication
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    // Standard 8N1 configuration
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    Ok(())
}

/// Clear the serial port buffers
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))
}

/// Open the async flavour of the port (tokio-serial)
pub fn open_async_port(
    name: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<tokio_serial::SerialStream, ProtocolError> {
    let builder = tokio_serial::new(name, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(timeout);
    let stream = tokio_serial::SerialStream::open(&builder)
        .map_err(|e| ProtocolError::SerialError(format!("{}: {}", name, e)))?;
    tokio_serial::SerialPort::clear(&stream, tokio_serial::ClearBuffer::All)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    tracing::info!(port = name, baud_rate, "Async serial port opened");
    Ok(stream)
}
