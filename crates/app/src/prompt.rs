//! Single-line text prompt
//!
//! A small topmost window with a label, an edit box and OK/Cancel buttons.
//! It runs its own message loop on the calling thread until dismissed.

use once_cell::sync::OnceCell;
use std::cell::RefCell;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::{GetStockObject, GetSysColorBrush, COLOR_BTNFACE, DEFAULT_GUI_FONT};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::SetFocus;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    GetSystemMetrics, GetWindowTextLengthW, GetWindowTextW, IsDialogMessageW, IsWindow,
    PostQuitMessage, RegisterClassExW, SendMessageW, SetForegroundWindow, ShowWindow,
    TranslateMessage, BS_DEFPUSHBUTTON, BS_PUSHBUTTON, ES_AUTOHSCROLL, HMENU,
    MSG, SM_CXSCREEN, SM_CYSCREEN, SW_SHOW, WINDOW_EX_STYLE, WINDOW_STYLE, WM_CLOSE, WM_COMMAND,
    WM_SETFONT, WNDCLASSEXW, WS_CAPTION, WS_CHILD, WS_EX_CLIENTEDGE, WS_EX_TOPMOST, WS_POPUP,
    WS_SYSMENU, WS_TABSTOP, WS_VISIBLE,
};

const PROMPT_CLASS: PCWSTR = w!("FreedomWallPrompt");

// Same ids IsDialogMessageW sends for Enter and Escape
const ID_OK: u16 = 1;
const ID_CANCEL: u16 = 2;
const ID_EDIT: u16 = 100;

const WIDTH: i32 = 440;
const MARGIN: i32 = 12;
const LINE_HEIGHT: i32 = 16;
const EDIT_HEIGHT: i32 = 24;
const BTN_WIDTH: i32 = 88;
const BTN_HEIGHT: i32 = 28;

static REGISTER: OnceCell<()> = OnceCell::new();

#[derive(Default)]
struct PromptState {
    edit: isize,
    done: bool,
    answer: Option<String>,
}

thread_local! {
    static PROMPT: RefCell<PromptState> = RefCell::new(PromptState::default());
}

fn to_wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

fn register_class(hinstance: HINSTANCE) -> windows::core::Result<()> {
    REGISTER
        .get_or_try_init(|| unsafe {
            let wc = WNDCLASSEXW {
                cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
                lpfnWndProc: Some(prompt_wnd_proc),
                hInstance: hinstance,
                hbrBackground: GetSysColorBrush(COLOR_BTNFACE),
                lpszClassName: PROMPT_CLASS,
                ..Default::default()
            };
            if RegisterClassExW(&wc) == 0 {
                return Err(windows::core::Error::from_win32());
            }
            Ok(())
        })
        .map(|_| ())
}

/// Ask for one line of text. `None` when cancelled or closed.
pub fn ask(title: &str, message: &str) -> windows::core::Result<Option<String>> {
    unsafe {
        let hmodule = GetModuleHandleW(None)?;
        let hinstance = HINSTANCE(hmodule.0);
        register_class(hinstance)?;

        let lines = message.lines().count().max(1) as i32;
        let label_height = lines * LINE_HEIGHT + 4;
        let client_height = MARGIN * 4 + label_height + EDIT_HEIGHT + BTN_HEIGHT;
        // Room for the caption bar
        let height = client_height + 32;

        let x = (GetSystemMetrics(SM_CXSCREEN) - WIDTH) / 2;
        let y = (GetSystemMetrics(SM_CYSCREEN) - height) / 2;

        let title_wide = to_wide(title);
        let hwnd = CreateWindowExW(
            WS_EX_TOPMOST,
            PROMPT_CLASS,
            PCWSTR(title_wide.as_ptr()),
            WS_POPUP | WS_CAPTION | WS_SYSMENU,
            x,
            y,
            WIDTH,
            height,
            None,
            None,
            hinstance,
            None,
        )?;

        let font = GetStockObject(DEFAULT_GUI_FONT);
        let inner_width = WIDTH - MARGIN * 2 - 16;

        let message_wide = to_wide(&message.replace('\n', "\r\n"));
        let label = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            w!("STATIC"),
            PCWSTR(message_wide.as_ptr()),
            WS_CHILD | WS_VISIBLE,
            MARGIN,
            MARGIN,
            inner_width,
            label_height,
            hwnd,
            None,
            hinstance,
            None,
        )?;

        let edit_y = MARGIN * 2 + label_height;
        let edit = CreateWindowExW(
            WS_EX_CLIENTEDGE,
            w!("EDIT"),
            w!(""),
            WS_CHILD | WS_VISIBLE | WS_TABSTOP | WINDOW_STYLE(ES_AUTOHSCROLL as u32),
            MARGIN,
            edit_y,
            inner_width,
            EDIT_HEIGHT,
            hwnd,
            HMENU(ID_EDIT as usize as _),
            hinstance,
            None,
        )?;

        let btn_y = edit_y + EDIT_HEIGHT + MARGIN;
        let cancel_x = MARGIN + inner_width - BTN_WIDTH;
        let ok = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            w!("BUTTON"),
            w!("OK"),
            WS_CHILD | WS_VISIBLE | WS_TABSTOP | WINDOW_STYLE(BS_DEFPUSHBUTTON as u32),
            cancel_x - BTN_WIDTH - MARGIN / 2,
            btn_y,
            BTN_WIDTH,
            BTN_HEIGHT,
            hwnd,
            HMENU(ID_OK as usize as _),
            hinstance,
            None,
        )?;
        let cancel = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            w!("BUTTON"),
            w!("Cancel"),
            WS_CHILD | WS_VISIBLE | WS_TABSTOP | WINDOW_STYLE(BS_PUSHBUTTON as u32),
            cancel_x,
            btn_y,
            BTN_WIDTH,
            BTN_HEIGHT,
            hwnd,
            HMENU(ID_CANCEL as usize as _),
            hinstance,
            None,
        )?;

        for child in [label, edit, ok, cancel] {
            SendMessageW(child, WM_SETFONT, WPARAM(font.0 as usize), LPARAM(1));
        }

        PROMPT.with(|state| {
            *state.borrow_mut() = PromptState {
                edit: edit.0 as isize,
                ..Default::default()
            };
        });

        let _ = ShowWindow(hwnd, SW_SHOW);
        let _ = SetForegroundWindow(hwnd);
        let _ = SetFocus(edit);

        // Nested loop: timers of the caller keep being dispatched
        let mut msg = MSG::default();
        loop {
            if PROMPT.with(|state| state.borrow().done) || !IsWindow(hwnd).as_bool() {
                break;
            }

            let ret = GetMessageW(&mut msg, None, 0, 0);
            if ret.0 == 0 {
                // WM_QUIT belongs to the outer loop
                PostQuitMessage(msg.wParam.0 as i32);
                let _ = DestroyWindow(hwnd);
                break;
            }
            if ret.0 == -1 {
                let _ = DestroyWindow(hwnd);
                break;
            }

            if !IsDialogMessageW(hwnd, &msg).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        Ok(PROMPT.with(|state| state.borrow_mut().answer.take()))
    }
}

unsafe fn edit_text(edit: HWND) -> String {
    let len = GetWindowTextLengthW(edit);
    if len <= 0 {
        return String::new();
    }
    let mut buf = vec![0u16; len as usize + 1];
    let copied = GetWindowTextW(edit, &mut buf);
    String::from_utf16_lossy(&buf[..copied.max(0) as usize])
}

fn finish(hwnd: HWND, answer: Option<String>) {
    PROMPT.with(|state| {
        let mut state = state.borrow_mut();
        state.done = true;
        state.answer = answer;
    });
    unsafe {
        let _ = DestroyWindow(hwnd);
    }
}

unsafe extern "system" fn prompt_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_COMMAND => {
            match (wparam.0 & 0xFFFF) as u16 {
                ID_OK => {
                    let edit = PROMPT.with(|state| state.borrow().edit);
                    let text = edit_text(HWND(edit as *mut std::ffi::c_void));
                    finish(hwnd, Some(text));
                }
                ID_CANCEL => finish(hwnd, None),
                _ => {}
            }
            LRESULT(0)
        }

        WM_CLOSE => {
            finish(hwnd, None);
            LRESULT(0)
        }

        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
