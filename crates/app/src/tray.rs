//! System tray icon on its own thread
//!
//! The tray never touches the overlay. Menu picks become [`Command`]s sent to
//! the UI thread.

use crate::command::{Command, CommandSender};
use crate::context::SharedStatus;
use crate::APP_NAME;
use anyhow::{anyhow, Context};
use std::cell::RefCell;
use std::thread::{self, JoinHandle};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NIM_MODIFY,
    NOTIFYICONDATAW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, CreateWindowExW, DefWindowProcW, DestroyMenu, DestroyWindow,
    DispatchMessageW, GetCursorPos, GetMessageW, LoadIconW, PostMessageW, PostQuitMessage,
    RegisterClassExW, SetForegroundWindow, TrackPopupMenu, TranslateMessage, HWND_MESSAGE,
    IDI_APPLICATION, MF_CHECKED, MF_SEPARATOR, MF_STRING, MF_UNCHECKED, MSG, TPM_BOTTOMALIGN,
    TPM_LEFTALIGN, TPM_NONOTIFY, TPM_RETURNCMD, WINDOW_EX_STYLE, WINDOW_STYLE, WM_CLOSE,
    WM_DESTROY, WM_LBUTTONUP, WM_MOUSEMOVE, WM_RBUTTONUP, WM_USER, WNDCLASSEXW,
};

fn make_int_resource(id: u16) -> PCWSTR {
    PCWSTR(id as *const u16)
}

/// Tray icon message
pub const WM_TRAYICON: u32 = WM_USER + 1;

/// Tray menu commands
const ID_TRAY_CREDITS: u32 = 1001;
const ID_TRAY_SET: u32 = 1002;
const ID_TRAY_DELETE: u32 = 1003;
const ID_TRAY_LIST: u32 = 1004;
const ID_TRAY_RELOAD: u32 = 1005;
const ID_TRAY_ENABLED: u32 = 1006;
const ID_TRAY_EXIT: u32 = 1007;

const TRAY_CLASS: PCWSTR = w!("FreedomWallTray");

fn menu_command(id: u32) -> Option<Command> {
    match id {
        ID_TRAY_CREDITS => Some(Command::ShowCredits),
        ID_TRAY_SET => Some(Command::OpenSettings),
        ID_TRAY_DELETE => Some(Command::Delete),
        ID_TRAY_LIST => Some(Command::ListRules),
        ID_TRAY_RELOAD => Some(Command::Reload),
        ID_TRAY_ENABLED => Some(Command::ToggleEnabled),
        ID_TRAY_EXIT => Some(Command::Exit),
        _ => None,
    }
}

fn tooltip(status: &SharedStatus) -> String {
    let status = status.lock();
    match (&status.target, status.enabled) {
        (_, false) => format!("{APP_NAME} (paused)"),
        (Some(target), true) => format!("{APP_NAME} - {target}"),
        (None, true) => APP_NAME.to_string(),
    }
}

/// Notification-area icon bound to a window
struct SystemTray {
    hwnd: HWND,
    nid: NOTIFYICONDATAW,
    visible: bool,
}

impl SystemTray {
    fn new(hwnd: HWND) -> Self {
        let mut nid = NOTIFYICONDATAW::default();
        nid.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        nid.hWnd = hwnd;
        nid.uID = 1;
        nid.uFlags = NIF_ICON | NIF_MESSAGE | NIF_TIP;
        nid.uCallbackMessage = WM_TRAYICON;

        let mut tray = Self {
            hwnd,
            nid,
            visible: false,
        };
        tray.write_tip(APP_NAME);
        tray
    }

    fn write_tip(&mut self, text: &str) {
        let tip_wide: Vec<u16> = text.encode_utf16().collect();
        let len = tip_wide.len().min(127);
        self.nid.szTip = [0; 128];
        self.nid.szTip[..len].copy_from_slice(&tip_wide[..len]);
    }

    fn show(&mut self) -> windows::core::Result<()> {
        if self.visible {
            return Ok(());
        }

        unsafe {
            // Embedded icon resource when present, stock icon otherwise
            let hmodule = GetModuleHandleW(None)?;
            let hinstance = HINSTANCE(hmodule.0);
            self.nid.hIcon = LoadIconW(hinstance, make_int_resource(1))
                .or_else(|_| LoadIconW(None, IDI_APPLICATION))
                .unwrap_or_default();

            if !Shell_NotifyIconW(NIM_ADD, &self.nid).as_bool() {
                return Err(windows::core::Error::from_win32());
            }
            self.visible = true;
        }
        Ok(())
    }

    fn hide(&mut self) {
        if !self.visible {
            return;
        }

        unsafe {
            let _ = Shell_NotifyIconW(NIM_DELETE, &self.nid);
        }
        self.visible = false;
    }

    fn set_tooltip(&mut self, text: &str) {
        self.write_tip(text);
        if self.visible {
            unsafe {
                let _ = Shell_NotifyIconW(NIM_MODIFY, &self.nid);
            }
        }
    }

    /// Show the context menu and return the picked item id (0 if dismissed)
    fn pick_from_menu(&self, enabled: bool) -> windows::core::Result<u32> {
        unsafe {
            let menu = CreatePopupMenu()?;

            let _ = AppendMenuW(menu, MF_STRING, ID_TRAY_CREDITS as usize, w!("FreedomWall"));
            let _ = AppendMenuW(menu, MF_SEPARATOR, 0, PCWSTR::null());
            let _ = AppendMenuW(menu, MF_STRING, ID_TRAY_SET as usize, w!("Set"));
            let _ = AppendMenuW(menu, MF_STRING, ID_TRAY_DELETE as usize, w!("Del"));
            let _ = AppendMenuW(menu, MF_STRING, ID_TRAY_LIST as usize, w!("List"));
            let _ = AppendMenuW(menu, MF_STRING, ID_TRAY_RELOAD as usize, w!("Reload"));
            let check = if enabled { MF_CHECKED } else { MF_UNCHECKED };
            let _ = AppendMenuW(menu, MF_STRING | check, ID_TRAY_ENABLED as usize, w!("Enabled"));
            let _ = AppendMenuW(menu, MF_SEPARATOR, 0, PCWSTR::null());
            let _ = AppendMenuW(menu, MF_STRING, ID_TRAY_EXIT as usize, w!("Quit"));

            let mut pt = POINT::default();
            let _ = GetCursorPos(&mut pt);

            // Required for the menu to close when clicking elsewhere
            let _ = SetForegroundWindow(self.hwnd);
            let picked = TrackPopupMenu(
                menu,
                TPM_LEFTALIGN | TPM_BOTTOMALIGN | TPM_RETURNCMD | TPM_NONOTIFY,
                pt.x,
                pt.y,
                0,
                self.hwnd,
                None,
            );

            let _ = DestroyMenu(menu);
            Ok(picked.0 as u32)
        }
    }
}

impl Drop for SystemTray {
    fn drop(&mut self) {
        self.hide();
    }
}

struct TrayThreadState {
    tray: SystemTray,
    sender: CommandSender,
    status: SharedStatus,
}

thread_local! {
    static TRAY: RefCell<Option<TrayThreadState>> = const { RefCell::new(None) };
}

/// Owner's handle to the tray thread
pub struct TrayHandle {
    // Stored as isize for thread safety
    hwnd: isize,
    thread: Option<JoinHandle<()>>,
}

impl TrayHandle {
    /// Start the tray thread and wait until its icon is up
    pub fn spawn(sender: CommandSender, status: SharedStatus) -> anyhow::Result<Self> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<isize, String>>(1);

        let thread = thread::Builder::new()
            .name("tray".into())
            .spawn(move || {
                let hwnd = match create_tray_window(sender, status) {
                    Ok(hwnd) => hwnd,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(hwnd.0 as isize));
                run_message_loop();
            })
            .context("spawn tray thread")?;

        let hwnd = ready_rx
            .recv()
            .context("tray thread exited before start-up")?
            .map_err(|e| anyhow!("tray icon: {e}"))?;

        tracing::info!("tray icon ready");
        Ok(Self {
            hwnd,
            thread: Some(thread),
        })
    }

    /// Remove the icon and join the tray thread
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        unsafe {
            let hwnd = HWND(self.hwnd as *mut std::ffi::c_void);
            let _ = PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0));
        }
        if thread.join().is_err() {
            tracing::warn!("tray thread panicked");
        }
    }
}

impl Drop for TrayHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn create_tray_window(sender: CommandSender, status: SharedStatus) -> windows::core::Result<HWND> {
    unsafe {
        let hmodule = GetModuleHandleW(None)?;
        let hinstance = HINSTANCE(hmodule.0);

        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(tray_wnd_proc),
            hInstance: hinstance,
            lpszClassName: TRAY_CLASS,
            ..Default::default()
        };
        RegisterClassExW(&wc);

        // Message-only window: receives the icon callbacks, never shown
        let hwnd = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            TRAY_CLASS,
            w!("FreedomWall Tray"),
            WINDOW_STYLE::default(),
            0,
            0,
            0,
            0,
            HWND_MESSAGE,
            None,
            hinstance,
            None,
        )?;

        let mut tray = SystemTray::new(hwnd);
        if let Err(e) = tray.show() {
            let _ = DestroyWindow(hwnd);
            return Err(e);
        }

        TRAY.with(|slot| {
            *slot.borrow_mut() = Some(TrayThreadState {
                tray,
                sender,
                status,
            });
        });
        Ok(hwnd)
    }
}

fn run_message_loop() {
    unsafe {
        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).into() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

fn on_tray_event(event: u32) {
    TRAY.with(|slot| {
        // Busy while the menu's own loop runs
        let Ok(mut slot) = slot.try_borrow_mut() else {
            return;
        };
        let Some(state) = slot.as_mut() else {
            return;
        };

        match event {
            WM_MOUSEMOVE => {
                let tip = tooltip(&state.status);
                state.tray.set_tooltip(&tip);
            }
            WM_RBUTTONUP | WM_LBUTTONUP => {
                let enabled = state.status.lock().enabled;
                match state.tray.pick_from_menu(enabled) {
                    Ok(id) => {
                        if let Some(command) = menu_command(id) {
                            state.sender.enqueue(command);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "tray menu failed"),
                }
            }
            _ => {}
        }
    });
}

unsafe extern "system" fn tray_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_TRAYICON => {
            on_tray_event((lparam.0 & 0xFFFF) as u32);
            LRESULT(0)
        }

        WM_CLOSE => {
            let _ = DestroyWindow(hwnd);
            LRESULT(0)
        }

        WM_DESTROY => {
            TRAY.with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = None;
                }
            });
            PostQuitMessage(0);
            LRESULT(0)
        }

        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
