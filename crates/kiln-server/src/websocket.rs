//! WebSocket-based live reload.

use kiln_pipeline::{Reload, ReloadSink};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload
    Reload,

    /// Swap a stylesheet without reloading the page
    Css {
        /// URL path of the rebuilt stylesheet
        href: String,
    },
}

/// Hub for broadcasting reload messages to all connected browsers.
#[derive(Debug, Clone)]
pub struct LiveReloadHub {
    sender: broadcast::Sender<LiveReloadMessage>,
}

impl LiveReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected browsers.
    pub fn send(&self, msg: LiveReloadMessage) {
        // No receivers is fine
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveReloadMessage> {
        self.sender.subscribe()
    }
}

impl Default for LiveReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadSink for LiveReloadHub {
    fn notify(&self, reload: &Reload) {
        match reload {
            Reload::None => {}
            Reload::Page => self.send(LiveReloadMessage::Reload),
            Reload::Stylesheet(href) => self.send(LiveReloadMessage::Css { href: href.clone() }),
        }
    }
}

/// Client script injected into served pages.
pub fn livereload_client_script() -> &'static str {
    r#"
(function() {
  'use strict';

  var ws = new WebSocket('ws://' + location.host + '/__livereload');

  ws.onmessage = function(event) {
    var msg = JSON.parse(event.data);

    switch (msg.type) {
      case 'reload':
        location.reload();
        break;

      case 'css':
        var links = document.querySelectorAll('link[rel="stylesheet"]');
        var swapped = false;
        links.forEach(function(link) {
          var url = new URL(link.href, location.href);
          if (url.pathname === msg.href) {
            url.searchParams.set('v', Date.now());
            link.href = url.toString();
            swapped = true;
          }
        });
        if (!swapped) {
          location.reload();
        }
        break;

      case 'connected':
        console.log('[kiln] live reload connected');
        break;
    }
  };

  ws.onclose = function() {
    console.log('[kiln] live reload disconnected');
    setTimeout(function() { location.reload(); }, 1000);
  };
})();
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = LiveReloadHub::new();
        let mut rx = hub.subscribe();

        hub.send(LiveReloadMessage::Reload);

        assert_eq!(rx.try_recv().unwrap(), LiveReloadMessage::Reload);
    }

    #[test]
    fn maps_stage_reloads() {
        let hub = LiveReloadHub::new();
        let mut rx = hub.subscribe();

        hub.notify(&Reload::None);
        hub.notify(&Reload::Stylesheet("/css/style.min.css".to_string()));
        hub.notify(&Reload::Page);

        assert_eq!(
            rx.try_recv().unwrap(),
            LiveReloadMessage::Css {
                href: "/css/style.min.css".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), LiveReloadMessage::Reload);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn serializes_messages() {
        let json = serde_json::to_string(&LiveReloadMessage::Css {
            href: "/css/a.css".to_string(),
        })
        .unwrap();

        assert_eq!(json, r#"{"type":"css","href":"/css/a.css"}"#);
    }
}
