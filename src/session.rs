//! Application-layer session engine.
//!
//! One [`Session`] per physical connection drives the half-duplex
//! request/response protocol: authenticate, issue a typed request, then
//! pull an acknowledgement-driven stream of response frames until a
//! terminal transmission cause. The session owns the station addresses
//! and the alternating frame-count bit; the link controller underneath
//! owns only the transport.
//!
//! # Streaming invariant
//!
//! Data-retrieval operations return a [`ResponseStream`] that must be
//! consumed to its end. Dropping one mid-stream leaves the meter with
//! frames still queued for this exchange, so the session refuses further
//! requests with [`Iec102Error::StreamNotExhausted`] instead of silently
//! corrupting the next exchange.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{Iec102Error, Result};
use crate::link::LinkLayer;
use crate::messages::Message;
use crate::transport::Transport;
use crate::types::{
    block_object_count, Cause, CauseField, ContractedPower, ControlField, FixedFrame, Frame,
    FunctionCode, InstantObject, InstantValuesGroup, ManufacturerId, MeterConfiguration, TimeA,
    TimeB, TotalsRequest, TypeId, VariableFrame,
};

/// Default frame receive timeout.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(60);

/// Default retry bound for the link-establishment primitives.
pub const DEFAULT_LINK_RETRIES: u32 = 2;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Station address (DER)
    pub der: u16,
    /// Measurement-point address
    pub dir_pm: u16,
    /// Time to wait for each frame
    pub frame_timeout: Duration,
    /// Resend bound for link-establishment primitives
    pub link_retries: u32,
}

impl SessionConfig {
    /// Create a configuration for the given station and measurement point.
    pub fn new(der: u16, dir_pm: u16) -> Self {
        Self {
            der,
            dir_pm,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            link_retries: DEFAULT_LINK_RETRIES,
        }
    }

    /// Set the frame receive timeout.
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    /// Set the link-establishment retry bound.
    pub fn link_retries(mut self, retries: u32) -> Self {
        self.link_retries = retries;
        self
    }
}

/// Register addresses of the reading stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingsRegister {
    /// Hourly load profiles (register 11)
    Profiles,
    /// Quarter-hour load profiles (register 12)
    QuarterHour,
    /// Daily billing summaries (register 21)
    DailyBillings,
}

impl ReadingsRegister {
    /// The register address on the wire.
    #[inline]
    pub const fn address(self) -> u8 {
        match self {
            Self::Profiles => 11,
            Self::QuarterHour => 12,
            Self::DailyBillings => 21,
        }
    }
}

/// Register addresses of the tariff contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractRegister {
    /// Contract I (register 134)
    Contract1,
    /// Contract II (register 135)
    Contract2,
    /// Contract III (register 136)
    Contract3,
    /// Latent contract I (register 137)
    Latent1,
    /// Latent contract II (register 138)
    Latent2,
}

impl ContractRegister {
    /// The register address on the wire.
    #[inline]
    pub const fn address(self) -> u8 {
        match self {
            Self::Contract1 => 134,
            Self::Contract2 => 135,
            Self::Contract3 => 136,
            Self::Latent1 => 137,
            Self::Latent2 => 138,
        }
    }
}

/// An IEC 60870-5-102 client session.
///
/// Created once per physical connection and not shared across
/// connections. All exchanges are strictly sequential; the protocol is
/// half-duplex by design.
#[derive(Debug)]
pub struct Session<T: Transport> {
    config: SessionConfig,
    link: LinkLayer<T>,
    fcb: bool,
    streaming: bool,
}

impl<T: Transport> Session<T> {
    /// Create a session over `transport`.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let link = LinkLayer::new(transport, config.frame_timeout, config.link_retries);
        Self {
            config,
            link,
            fcb: false,
            streaming: false,
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open the transport and establish the link: status probe, then
    /// remote link reposition.
    pub async fn connect(&mut self) -> Result<()> {
        self.link.connect().await?;
        self.link.link_state_request(self.config.der).await?;
        self.link.remote_link_reposition(self.config.der).await?;
        self.fcb = false;
        self.streaming = false;
        info!(der = self.config.der, "link established");
        Ok(())
    }

    /// Close the transport.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.link.disconnect().await
    }

    /// Authenticate against the metering point.
    ///
    /// The password travels as a 4-byte little-endian integer. Returns the
    /// meter's first response frame, whose cause reports the outcome.
    pub async fn authenticate(&mut self, password: u32) -> Result<VariableFrame> {
        self.send_request(Message::Authenticate { password }, 0)
            .await?;
        self.first_response().await
    }

    /// Finish the session.
    ///
    /// Teardown must never block connection close: every error here is
    /// logged and swallowed.
    pub async fn finish_session(&mut self) {
        let result = async {
            self.send_request(Message::FinishSession, 0).await?;
            let mut stream = self.stream(None);
            stream.drain().await
        }
        .await;
        if let Err(err) = result {
            warn!("error finishing session: {err}");
        }
    }

    /// Read the meter's current date and time.
    pub async fn read_datetime(&mut self) -> Result<TimeB> {
        let frame = self
            .single_response(Message::ReadDateTime, 0, TypeId::DateTime)
            .await?;
        match frame.payload {
            Some(Message::DateTime(time)) => Ok(time),
            _ => Err(Iec102Error::protocol(
                "date-time response carried no time label",
            )),
        }
    }

    /// Set the meter's date and time. The meter echoes the write on
    /// confirmation; the echoed frame is returned.
    pub async fn set_datetime(&mut self, time: TimeB) -> Result<VariableFrame> {
        self.single_response(Message::SetDateTime(time), 0, TypeId::SetDateTime)
            .await
    }

    /// Read the manufacturer and equipment identifier.
    pub async fn get_info(&mut self) -> Result<ManufacturerId> {
        let frame = self
            .single_response(Message::ReadManufacturerId, 0, TypeId::ManufacturerId)
            .await?;
        match frame.payload {
            Some(Message::ManufacturerId(id)) => Ok(id),
            _ => Err(Iec102Error::protocol(
                "identification response carried no data",
            )),
        }
    }

    /// Read the metering-point configuration.
    pub async fn get_configuration(&mut self) -> Result<MeterConfiguration> {
        let frame = self
            .single_response(Message::ReadConfiguration, 0, TypeId::Configuration)
            .await?;
        match frame.payload {
            Some(Message::Configuration(config)) => Ok(config),
            _ => Err(Iec102Error::protocol(
                "configuration response carried no data",
            )),
        }
    }

    /// Read the contracted powers of one contract register.
    pub async fn get_contracted_powers(
        &mut self,
        register: ContractRegister,
    ) -> Result<(Vec<ContractedPower>, TimeA)> {
        let frame = self
            .single_response(
                Message::ReadContractedPowers,
                register.address(),
                TypeId::ContractedPowers,
            )
            .await?;
        match frame.payload {
            Some(Message::ContractedPowers { powers, timestamp }) => Ok((powers, timestamp)),
            _ => Err(Iec102Error::protocol(
                "contracted-powers response carried no data",
            )),
        }
    }

    /// Read the daylight-saving switch dates: (winter-to-summer,
    /// summer-to-winter).
    pub async fn read_daylight_change_dates(&mut self) -> Result<(TimeA, TimeA)> {
        let frame = self
            .single_response(
                Message::ReadDaylightChangeDates,
                0,
                TypeId::DaylightChangeDates,
            )
            .await?;
        match frame.payload {
            Some(Message::DaylightChangeDates {
                winter_to_summer,
                summer_to_winter,
            }) => Ok((winter_to_summer, summer_to_winter)),
            _ => Err(Iec102Error::protocol(
                "daylight-change response carried no data",
            )),
        }
    }

    /// Read instant values (protocol extension) for the given objects.
    pub async fn read_instant_values(
        &mut self,
        objects: &[InstantObject],
    ) -> Result<(Vec<InstantValuesGroup>, TimeB)> {
        let mut requested: Vec<InstantObject> = Vec::new();
        for object in objects {
            if !requested.contains(object) {
                requested.push(*object);
            }
        }
        let frame = self
            .single_response(
                Message::ReadInstantValues { objects: requested },
                0,
                TypeId::InstantValues,
            )
            .await?;
        match frame.payload {
            Some(Message::InstantValues { groups, timestamp }) => Ok((groups, timestamp)),
            _ => Err(Iec102Error::protocol(
                "instant-values response carried no data",
            )),
        }
    }

    /// Read absolute integrated totals (counter readings) over a period.
    ///
    /// Returns the stream of matching response frames; it must be
    /// consumed to its end (see the module docs).
    pub async fn read_absolute_values(
        &mut self,
        start: TimeA,
        end: TimeA,
        register: ReadingsRegister,
    ) -> Result<ResponseStream<'_, T>> {
        self.send_request(
            Message::ReadAbsoluteTotals(TotalsRequest::new(start, end)),
            register.address(),
        )
        .await?;
        self.drain_activation().await?;
        Ok(self.stream(Some(TypeId::AbsoluteTotals)))
    }

    /// Read incremental integrated totals (energy increments) over a
    /// period. The stream must be consumed to its end.
    pub async fn read_incremental_values(
        &mut self,
        start: TimeA,
        end: TimeA,
        register: ReadingsRegister,
    ) -> Result<ResponseStream<'_, T>> {
        self.send_request(
            Message::ReadIncrementalTotals(TotalsRequest::new(start, end)),
            register.address(),
        )
        .await?;
        self.drain_activation().await?;
        Ok(self.stream(Some(TypeId::IncrementalTotals)))
    }

    /// Read blocks of incremental totals for one object address (9, 10 or
    /// 11). The stream must be consumed to its end.
    pub async fn read_block_incremental_values(
        &mut self,
        start: TimeA,
        end: TimeA,
        register: ReadingsRegister,
        object: u8,
    ) -> Result<ResponseStream<'_, T>> {
        if block_object_count(object).is_none() {
            return Err(Iec102Error::protocol(format!(
                "invalid block object address {object}"
            )));
        }
        self.send_request(
            Message::ReadBlockTotals { object, start, end },
            register.address(),
        )
        .await?;
        self.drain_activation().await?;
        Ok(self.stream(Some(TypeId::BlockTotals)))
    }

    /// Read the current billing values of one contract register. The
    /// stream must be consumed to its end.
    pub async fn current_tariff_info(
        &mut self,
        register: ContractRegister,
    ) -> Result<ResponseStream<'_, T>> {
        self.send_request(Message::ReadCurrentTariff, register.address())
            .await?;
        self.drain_activation().await?;
        Ok(self.stream(Some(TypeId::CurrentTariff)))
    }

    /// Read the stored billing values of one contract register over a
    /// period. The stream must be consumed to its end.
    pub async fn stored_tariff_info(
        &mut self,
        start: TimeA,
        end: TimeA,
        register: ContractRegister,
    ) -> Result<ResponseStream<'_, T>> {
        self.send_request(Message::ReadStoredTariff { start, end }, register.address())
            .await?;
        self.drain_activation().await?;
        Ok(self.stream(Some(TypeId::StoredTariff)))
    }

    // Internal methods

    /// Toggle the frame-count bit; every request that reads it alternates.
    fn next_fcb(&mut self) -> bool {
        self.fcb = !self.fcb;
        self.fcb
    }

    fn build_request(&mut self, message: Message, register: u8) -> VariableFrame {
        let fcb = self.next_fcb();
        VariableFrame {
            control: ControlField::primary(FunctionCode::UserData, fcb, true),
            der: self.config.der,
            type_id: message.type_id(),
            qualifier: message.qualifier(),
            cause: CauseField::new(message.request_cause()),
            dir_pm: self.config.dir_pm,
            register,
            data: message.encode_data(),
            payload: Some(message),
        }
    }

    /// Send a request frame and await the link-level acknowledgement (any
    /// successfully parsed frame). Failure to receive one is fatal to the
    /// request.
    async fn send_request(&mut self, message: Message, register: u8) -> Result<()> {
        if self.streaming {
            return Err(Iec102Error::StreamNotExhausted);
        }
        let frame = Frame::Variable(self.build_request(message, register));
        info!("request {}", frame);
        self.link.send_frame(&frame).await?;
        self.link
            .recv_frame()
            .await
            .map_err(|err| Iec102Error::protocol(format!("no link acknowledgement: {err}")))?;
        Ok(())
    }

    fn stream(&mut self, filter: Option<TypeId>) -> ResponseStream<'_, T> {
        self.streaming = true;
        ResponseStream {
            session: self,
            filter,
            done: false,
        }
    }

    /// Drain the activation phase of a parameterised retrieval: poll until
    /// the meter confirms, discarding the confirmation frames.
    async fn drain_activation(&mut self) -> Result<()> {
        let mut stream = self.stream(None);
        stream.drain().await
    }

    /// Collect one phase and return its first frame.
    async fn first_response(&mut self) -> Result<VariableFrame> {
        let mut stream = self.stream(None);
        let mut first = None;
        while let Some(frame) = stream.next().await? {
            if first.is_none() {
                first = Some(frame);
            }
        }
        first.ok_or_else(|| Iec102Error::protocol("no response received"))
    }

    /// Collect one phase and return the first frame of the wanted type.
    async fn single_response(
        &mut self,
        message: Message,
        register: u8,
        want: TypeId,
    ) -> Result<VariableFrame> {
        self.send_request(message, register).await?;
        let mut stream = self.stream(None);
        let mut found = None;
        while let Some(frame) = stream.next().await? {
            if found.is_none() && frame.type_id == want {
                found = Some(frame);
            }
        }
        found.ok_or_else(|| Iec102Error::protocol(format!("no {want} response received")))
    }

    /// Send one "request class-2 data" poll and receive the reply.
    async fn poll_response(&mut self) -> Result<Frame> {
        let fcb = self.next_fcb();
        let poll = Frame::Fixed(FixedFrame::new(
            FunctionCode::RequestClass2Data,
            fcb,
            true,
            self.config.der,
        ));
        self.link.send_frame(&poll).await?;
        self.link
            .recv_frame()
            .await
            .map_err(|err| Iec102Error::protocol(format!("no response frame: {err}")))
    }

    /// Apply the transmission-cause table to a received response.
    ///
    /// Returns whether more frames follow. Error causes and unclassified
    /// codes terminate the exchange with a typed error; unclassified
    /// codes are strictly fatal — their semantics are undefined and must
    /// not be guessed.
    fn classify(&self, frame: &VariableFrame) -> Result<bool> {
        let cause = match frame.cause.cause() {
            Ok(cause) => cause,
            Err(err) => {
                error!(
                    "unclassified transmission cause 0x{:02x} for {}",
                    frame.cause.code, frame.type_id
                );
                return Err(err);
            }
        };
        match cause {
            Cause::Request if frame.type_id.is_continuation_capable() => {
                debug!("next batch follows for {}", frame.type_id);
                Ok(true)
            }
            Cause::Request => {
                debug!("single response delivered");
                Ok(false)
            }
            Cause::ActivationConfirm => {
                info!("activation confirmed");
                Ok(false)
            }
            Cause::ActivationTermination => {
                info!("activation terminated");
                Ok(false)
            }
            Cause::TypeNotAvailable => {
                error!("requested ASDU type not available");
                Err(Iec102Error::TypeNotAvailable)
            }
            Cause::DirectionUnknown => {
                error!("ASDU direction specification unknown");
                Err(Iec102Error::DirectionUnknown)
            }
            Cause::ObjectNotAvailable => {
                error!("requested information object not available");
                Err(Iec102Error::IntegrationPeriodNotAvailable)
            }
            Cause::PeriodNotAvailable => {
                error!("requested integration period not available");
                Err(Iec102Error::IntegrationPeriodNotAvailable)
            }
            // A meter must never send the activation cause back.
            Cause::Activation => {
                error!("unexpected activation cause in response");
                Err(Iec102Error::UnknownCause(cause.as_u8()))
            }
        }
    }
}

/// A finite, forward-only sequence of response frames.
///
/// Each [`next`](Self::next) call sends one "ready for more" poll and
/// yields the received frame if it passes the type filter. The stream is
/// non-restartable and must be consumed until `next` returns `Ok(None)`;
/// a stream dropped early leaves the session poisoned and every later
/// request fails with [`Iec102Error::StreamNotExhausted`].
#[derive(Debug)]
pub struct ResponseStream<'a, T: Transport> {
    session: &'a mut Session<T>,
    filter: Option<TypeId>,
    done: bool,
}

impl<T: Transport> ResponseStream<'_, T> {
    /// Pull the next matching response frame.
    ///
    /// Returns `Ok(None)` once the exchange reached its terminal cause.
    pub async fn next(&mut self) -> Result<Option<VariableFrame>> {
        loop {
            if self.done {
                return Ok(None);
            }
            let frame = match self.session.poll_response().await {
                Ok(frame) => frame,
                Err(err) => {
                    // Transport failure mid-stream: the session stays
                    // poisoned, the wire state is unknown.
                    self.done = true;
                    return Err(err);
                }
            };
            let Frame::Variable(var) = frame else {
                // Fixed frames carry no transmission cause; keep polling.
                continue;
            };
            match self.session.classify(&var) {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    self.session.streaming = false;
                }
                Err(err) => {
                    self.done = true;
                    if !matches!(err, Iec102Error::UnknownCause(_)) {
                        // The meter ended the exchange with a classified
                        // error; the session may continue.
                        self.session.streaming = false;
                    }
                    return Err(err);
                }
            }
            if self.filter.map_or(true, |want| var.type_id == want) {
                return Ok(Some(var));
            }
        }
    }

    /// Whether the exchange reached its terminal cause.
    pub fn is_finished(&self) -> bool {
        self.done
    }

    /// Consume the remaining frames, discarding them.
    pub async fn drain(&mut self) -> Result<()> {
        while self.next().await?.is_some() {}
        Ok(())
    }
}

impl<T: Transport> Drop for ResponseStream<'_, T> {
    fn drop(&mut self) {
        if !self.done {
            warn!("response stream dropped before exhaustion; session is unusable mid-stream");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::new(34572, 1)
            .frame_timeout(Duration::from_secs(5))
            .link_retries(4);
        assert_eq!(config.der, 34572);
        assert_eq!(config.dir_pm, 1);
        assert_eq!(config.frame_timeout, Duration::from_secs(5));
        assert_eq!(config.link_retries, 4);

        let config = SessionConfig::new(1, 1);
        assert_eq!(config.frame_timeout, DEFAULT_FRAME_TIMEOUT);
        assert_eq!(config.link_retries, DEFAULT_LINK_RETRIES);
    }

    #[test]
    fn test_register_addresses() {
        assert_eq!(ReadingsRegister::Profiles.address(), 11);
        assert_eq!(ReadingsRegister::QuarterHour.address(), 12);
        assert_eq!(ReadingsRegister::DailyBillings.address(), 21);

        assert_eq!(ContractRegister::Contract1.address(), 134);
        assert_eq!(ContractRegister::Contract2.address(), 135);
        assert_eq!(ContractRegister::Contract3.address(), 136);
        assert_eq!(ContractRegister::Latent1.address(), 137);
        assert_eq!(ContractRegister::Latent2.address(), 138);
    }

    #[test]
    fn test_fcb_alternates_per_request() {
        let mut session = Session::new(MockTransport::new(), SessionConfig::new(1, 1));
        let first = session.build_request(Message::ReadDateTime, 0);
        let second = session.build_request(Message::ReadDateTime, 0);
        let third = session.build_request(Message::ReadDateTime, 0);
        assert!(first.control.fcb);
        assert!(!second.control.fcb);
        assert!(third.control.fcb);
        assert!(first.control.fcv && second.control.fcv);
    }

    #[test]
    fn test_build_request_addresses() {
        let mut session = Session::new(MockTransport::new(), SessionConfig::new(34572, 7));
        let frame = session.build_request(Message::Authenticate { password: 7 }, 0);
        assert_eq!(frame.der, 34572);
        assert_eq!(frame.dir_pm, 7);
        assert_eq!(frame.register, 0);
        assert_eq!(frame.qualifier, 1);
        assert_eq!(frame.cause.code, Cause::Activation.as_u8());
        assert_eq!(frame.declared_length(), 13);
    }

    #[test]
    fn test_classify_follows_cause_table() {
        let session = Session::new(MockTransport::new(), SessionConfig::new(1, 1));
        let mut frame = VariableFrame {
            control: ControlField::from_u8(0x08),
            der: 1,
            type_id: TypeId::IncrementalTotals,
            qualifier: 0,
            cause: CauseField::from_u8(0x05),
            dir_pm: 1,
            register: 11,
            data: bytes::Bytes::new(),
            payload: None,
        };

        // 0x05 on a continuation-capable type: more data follows
        assert!(session.classify(&frame).unwrap());

        // 0x05 on a single-shot type: done
        frame.type_id = TypeId::DateTime;
        assert!(!session.classify(&frame).unwrap());

        // 0x07 / 0x0A: done
        frame.cause = CauseField::from_u8(0x07);
        assert!(!session.classify(&frame).unwrap());
        frame.cause = CauseField::from_u8(0x0A);
        assert!(!session.classify(&frame).unwrap());

        // classified error causes
        frame.cause = CauseField::from_u8(0x0E);
        assert!(matches!(
            session.classify(&frame),
            Err(Iec102Error::TypeNotAvailable)
        ));
        frame.cause = CauseField::from_u8(0x10);
        assert!(matches!(
            session.classify(&frame),
            Err(Iec102Error::DirectionUnknown)
        ));
        frame.cause = CauseField::from_u8(0x11);
        assert!(matches!(
            session.classify(&frame),
            Err(Iec102Error::IntegrationPeriodNotAvailable)
        ));
        frame.cause = CauseField::from_u8(0x12);
        assert!(matches!(
            session.classify(&frame),
            Err(Iec102Error::IntegrationPeriodNotAvailable)
        ));

        // anything else is strictly fatal
        frame.cause = CauseField::from_u8(0x2A);
        assert!(matches!(
            session.classify(&frame),
            Err(Iec102Error::UnknownCause(0x2A))
        ));
    }
}
