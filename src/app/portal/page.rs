use core::fmt::{self, Write};

use gateway_bootloader::{
    config::{BOOTLOADER_VERSION, DEFAULT_LORA_PRESET, DEFAULT_LORA_REGION},
    provisioning::lora,
};
use heapless::String;

pub(super) const PAGE_MAX: usize = 6 * 1024;

pub(super) type Page = String<PAGE_MAX>;

const HEAD: &str = r#"<!DOCTYPE html><html><head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"><title>Gateway Setup</title><style>body{font-family:sans-serif;max-width:420px;margin:24px auto;padding:0 12px}label{display:block;margin-top:12px}input,select{width:100%;padding:6px;box-sizing:border-box}button{margin-top:18px;width:100%;padding:10px}#status{margin-top:12px}</style></head><body><h2>Meshtastic Telegram Gateway</h2><form id="cfg"><label>WiFi SSID<input name="wifi_ssid" maxlength="32" required></label><label>WiFi password<input name="wifi_pass" type="password" maxlength="64"></label><label>Telegram bot token<input name="bot_token" maxlength="64" required></label><label>Telegram chat id<input name="chat_id" maxlength="32" required></label>"#;

const SCRIPT: &str = r#"<button type="submit">Save and reboot</button></form><div id="status"></div><script>document.getElementById('cfg').onsubmit=function(e){e.preventDefault();var d={};new FormData(e.target).forEach(function(v,k){d[k]=v});var s=document.getElementById('status');s.textContent='Saving...';fetch('/save',{method:'POST',headers:{'Content-Type':'application/json'},body:JSON.stringify(d)}).then(function(r){return r.text().then(function(t){s.textContent=r.ok?'Saved. The gateway restarts in a few seconds.':'Error: '+t})}).catch(function(){s.textContent='Request failed'})};</script>"#;

/// Renders the setup form with the LoRa option lists.
pub(super) fn render() -> Result<Page, fmt::Error> {
    let mut page = Page::new();
    page.push_str(HEAD).map_err(|_| fmt::Error)?;
    select(&mut page, "LoRa region", "lora_region", lora::regions(), DEFAULT_LORA_REGION)?;
    select(&mut page, "LoRa preset", "lora_preset", lora::presets(), DEFAULT_LORA_PRESET)?;
    page.push_str(SCRIPT).map_err(|_| fmt::Error)?;
    write!(page, "<p><small>bootloader v{}</small></p></body></html>", BOOTLOADER_VERSION)?;
    Ok(page)
}

fn select(
    page: &mut Page,
    label: &str,
    name: &str,
    options: impl Iterator<Item = (i32, &'static str)>,
    selected: i32,
) -> fmt::Result {
    write!(page, r#"<label>{}<select name="{}">"#, label, name)?;
    for (code, option) in options {
        let marker = if code == selected { " selected" } else { "" };
        write!(page, r#"<option value="{}"{}>{}</option>"#, code, marker, option)?;
    }
    page.write_str("</select></label>")
}
