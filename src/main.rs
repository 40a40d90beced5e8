//! Statement Console Desktop - Main Entry Point
//!
//! Desktop admin console for querying bank-account statement data.
//! Owns the session state, the idle-timeout watcher and the dashboard
//! pollers; the webview renders on top of them.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::sync::Arc;

use anyhow::Context;
use tauri::Manager;
use tracing::info;

use statement_console_lib::{api::ApiClient, commands, logging, storage::DiskStore, AppState};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    logging::init();
    info!("Statement Console starting...");

    const DEFAULT_API_URL: &str = "http://localhost:3000";

    let api_base_url =
        std::env::var("STATEMENT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

    let app_state = AppState::new(
        Arc::new(DiskStore::new()),
        ApiClient::new(&api_base_url),
    );

    tauri::Builder::default()
        .plugin(tauri_plugin_shell::init())
        .on_window_event(|window, event| {
            if let tauri::WindowEvent::CloseRequested { api, .. } = event {
                let _ = window.hide();
                api.prevent_close();
            }
        })
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            commands::get_session_state,
            commands::login,
            commands::logout,
            commands::record_activity,
            commands::navigate,
            commands::start_monitors,
            commands::stop_monitors,
            commands::refresh_dashboard,
            commands::refresh_imports,
            commands::refresh_notifications,
            commands::set_polling_enabled,
            commands::get_account_cache,
            commands::save_account_cache,
            commands::clear_account_cache,
            commands::minimize_window,
            commands::hide_to_tray,
            commands::close_window,
        ])
        .setup(|app| {
            let tray_menu = tauri::menu::Menu::with_items(
                app,
                &[
                    &tauri::menu::MenuItem::with_id(app, "show", "Show", true, None::<&str>)?,
                    &tauri::menu::MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?,
                ],
            )?;

            let mut tray = tauri::tray::TrayIconBuilder::new()
                .menu(&tray_menu)
                .on_menu_event(|app, event| match event.id().as_ref() {
                    "show" => {
                        if let Some(window) = app.get_webview_window("main") {
                            let _ = window.show();
                            let _ = window.set_focus();
                        }
                    }
                    "quit" => {
                        app.exit(0);
                    }
                    _ => {}
                })
                .on_tray_icon_event(|tray, event| {
                    if let tauri::tray::TrayIconEvent::Click {
                        button: tauri::tray::MouseButton::Left,
                        ..
                    } = event
                    {
                        let app = tray.app_handle();
                        if let Some(window) = app.get_webview_window("main") {
                            let _ = window.show();
                            let _ = window.set_focus();
                        }
                    }
                });
            if let Some(icon) = app.default_window_icon() {
                tray = tray.icon(icon.clone());
            }
            tray.build(app)?;

            info!("Application setup complete");
            Ok(())
        })
        .run(tauri::generate_context!())
        .context("Error running Statement Console")?;

    Ok(())
}
