//! HTTP server for ESP32.
//!
//! Registers the `coredump-core` handlers on `EspHttpServer` and ties the
//! server's lifetime to the access point: started when the AP comes up,
//! stopped (dropped) when it goes down.

use anyhow::Result;
use embedded_svc::http::server::{Request, Response};
use embedded_svc::io::Write;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer};
use esp_idf_svc::http::Method;
use esp_idf_svc::sys::{self, esp};
use esp_idf_svc::wifi::WifiEvent;
use log::info;

use coredump_core::{
    AbortFault, ChunkSink, CrashTrigger, DownloadDump, DumpConfig, DumpError, Endpoint,
    HttpConfig, IndexPage, ResponseHead, ServeBody, ServerSlot, TransportError,
};

use crate::partition::EspPartitions;

type HttpRequest<'a, 'r> = Request<&'a mut EspHttpConnection<'r>>;
type HttpResponse<'a, 'r> = Response<&'a mut EspHttpConnection<'r>>;

/// Chunk sink over an IDF HTTP request.
///
/// Every `write` on an IDF response is sent with `httpd_resp_send_chunk`.
/// The zero-length terminator is sent by esp-idf-svc when the handler
/// returns, so `finish` only flushes. `commit` sends it right away, for
/// handlers that never return.
pub struct EspChunkSink<'a, 'r> {
    request: Option<HttpRequest<'a, 'r>>,
    response: Option<HttpResponse<'a, 'r>>,
    finished: bool,
}

impl<'a, 'r> EspChunkSink<'a, 'r> {
    pub fn new(request: HttpRequest<'a, 'r>) -> Self {
        Self {
            request: Some(request),
            response: None,
            finished: false,
        }
    }

    fn response(&mut self) -> Result<&mut HttpResponse<'a, 'r>, TransportError> {
        self.response.as_mut().ok_or(TransportError::Unusable)
    }
}

fn transport_error(err: impl core::fmt::Debug) -> TransportError {
    TransportError::Io(format!("{:?}", err))
}

impl ChunkSink for EspChunkSink<'_, '_> {
    fn open(&mut self, head: &ResponseHead) -> Result<(), TransportError> {
        let request = self.request.take().ok_or(TransportError::Unusable)?;
        let headers = head.headers();
        let headers: Vec<(&str, &str)> = headers
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();

        let response = request
            .into_response(head.status, None, &headers)
            .map_err(transport_error)?;
        self.response = Some(response);
        Ok(())
    }

    fn send_chunk(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.finished {
            return Err(TransportError::Unusable);
        }
        self.response()?.write_all(data).map_err(transport_error)
    }

    fn finish(&mut self) -> Result<(), TransportError> {
        if self.finished {
            return Err(TransportError::Unusable);
        }
        self.response()?.flush().map_err(transport_error)?;
        self.finished = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TransportError> {
        if !self.finished {
            return Err(TransportError::Unusable);
        }
        // Taking the response leaves nothing for a second terminator.
        let mut response = self.response.take().ok_or(TransportError::Unusable)?;
        let raw = response
            .connection()
            .raw_connection()
            .map_err(transport_error)?;
        esp!(unsafe { sys::httpd_resp_send_chunk(raw.handle(), core::ptr::null(), 0) })
            .map_err(transport_error)
    }
}

fn serve<H: ServeBody>(handler: &H, request: HttpRequest<'_, '_>) -> Result<(), DumpError> {
    handler.serve(EspChunkSink::new(request)).map(drop)
}

/// `aa:bb:cc:dd:ee:ff`
fn format_mac(mac: [u8; 6]) -> String {
    mac.iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<Vec<_>>()
        .join(":")
}

/// Start the HTTP server and register the URI handlers.
pub fn start_server(config: &HttpConfig, dump: DumpConfig) -> Result<EspHttpServer<'static>> {
    let server_config = Configuration {
        http_port: config.port,
        max_resp_headers: config.max_resp_headers,
        lru_purge_enable: config.lru_purge_enable,
        ..Default::default()
    };

    info!("Starting server on port: '{}'", config.port);
    let mut server = EspHttpServer::new(&server_config)?;

    info!("Registering URI handlers");
    let index = IndexPage::default();
    let download = DownloadDump::new(EspPartitions, dump);
    let crash = CrashTrigger::new(index, AbortFault);

    server.fn_handler(Endpoint::Index.path(), Method::Get, move |request| {
        serve(&index, request)
    })?;
    server.fn_handler(Endpoint::Download.path(), Method::Get, move |request| {
        serve(&download, request)
    })?;
    server.fn_handler(Endpoint::Crash.path(), Method::Get, move |request| {
        serve(&crash, request)
    })?;

    Ok(server)
}

/// Run the server for as long as the access point is up.
///
/// The server is started immediately, then stopped on `ApStopped` and
/// restarted on `ApStarted`. The returned subscription owns the server;
/// dropping it stops both.
pub fn run_server(
    sysloop: &EspSystemEventLoop,
    config: HttpConfig,
    dump: DumpConfig,
) -> Result<EspSubscription<'static, System>> {
    let mut slot = ServerSlot::new();
    slot.on_connect(|| start_server(&config, dump.clone()));

    let subscription = sysloop.subscribe::<WifiEvent, _>(move |event| match event {
        WifiEvent::ApStarted => {
            slot.on_connect(|| start_server(&config, dump.clone()));
        }
        WifiEvent::ApStopped => slot.on_disconnect(drop),
        WifiEvent::ApStaConnected(station) => info!(
            "station {} join, AID={}",
            format_mac(station.mac()),
            station.aid()
        ),
        WifiEvent::ApStaDisconnected(station) => info!(
            "station {} leave, AID={}",
            format_mac(station.mac()),
            station.aid()
        ),
        _ => {}
    })?;

    Ok(subscription)
}
