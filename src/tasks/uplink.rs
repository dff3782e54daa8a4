use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_net::Stack;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use heapless::String;
use reqwless::client::HttpClient;
use reqwless::request::{Method, RequestBuilder};

use crate::config::{self, RECORD_QUEUE_DEPTH};
use crate::telemetry::{self, deliver, Record, Uplink, UplinkError, AUTHORIZATION_CAPACITY};

const TCP_BUFFER_LEN: usize = 1024;
const RX_BUFFER_LEN: usize = 1024;

/// Posts records over HTTP with a bearer token.
pub struct HttpUplink<'a> {
    stack: Stack<'a>,
    url: &'a str,
    authorization: String<AUTHORIZATION_CAPACITY>,
    rx_buffer: [u8; RX_BUFFER_LEN],
}

impl<'a> HttpUplink<'a> {
    pub fn new(stack: Stack<'a>, url: &'a str, authorization: String<AUTHORIZATION_CAPACITY>) -> Self {
        Self {
            stack,
            url,
            authorization,
            rx_buffer: [0; RX_BUFFER_LEN],
        }
    }
}

impl Uplink for HttpUplink<'_> {
    async fn post(&mut self, body: &[u8]) -> Result<u16, UplinkError> {
        let state = TcpClientState::<1, TCP_BUFFER_LEN, TCP_BUFFER_LEN>::new();
        let tcp = TcpClient::new(self.stack, &state);
        let dns = DnsSocket::new(self.stack);
        let mut client = HttpClient::new(&tcp, &dns);

        let headers = [
            ("Authorization", self.authorization.as_str()),
            ("Content-Type", "text/plain; charset=utf-8"),
        ];
        let request = client
            .request(Method::POST, self.url)
            .await
            .map_err(|_| UplinkError::Connect)?;
        let mut request = request.headers(&headers).body(body);

        let response = request
            .send(&mut self.rx_buffer)
            .await
            .map_err(|_| UplinkError::Request)?;
        Ok(response.status.0)
    }
}

#[embassy_executor::task]
pub async fn uplink_task(
    stack: Stack<'static>,
    records: Receiver<'static, CriticalSectionRawMutex, Record, RECORD_QUEUE_DEPTH>,
) {
    let authorization = match telemetry::authorization(config::API_TOKEN) {
        Ok(header) => header,
        Err(e) => {
            error!("API token does not fit the header: {:?}", e);
            return;
        }
    };
    let mut uplink = HttpUplink::new(stack, config::ENDPOINT_URL, authorization);

    loop {
        let record = records.receive().await;
        stack.wait_config_up().await;
        if deliver(&mut uplink, &record).await.is_err() {
            warn!("record of {} bytes lost", record.len());
        }
    }
}
