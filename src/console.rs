//! Interactive terminal shell.
//!
//! One process is one session, mirroring a browser tab: commands map onto
//! the page controllers, and the session-expired broadcast drops the shell
//! back to the login prompt. Command parsing is a pure function so it can
//! be tested without a terminal.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use crate::api::{OrderFilter, ProductFilter, ProductPayload, UserAdminFilter};
use crate::app::{App, PageFlow, Redirect, Route};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::http::session::SessionState;
use crate::model::{Order, Role, UserStatus};
use crate::pages::{
    CartPage, CartView, DashboardPage, EditOrderPage, LoginPage, OrderDraft, OrdersPage,
    ProductsPage, UserManagementPage,
};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    Login { username: String, password: String },
    Register { username: String, password: String, role: Role },
    Logout,
    WhoAmI,
    Products { search: Option<String> },
    ProductAdd { name: String, price: Decimal, stock: u32 },
    ProductStock { id: i64, stock: u32 },
    ProductDrop { id: i64 },
    Customers,
    CustomerSelect { id: i64 },
    CustomerClear,
    Cart,
    CartAdd { product_id: i64, quantity: u32 },
    CartInc { product_id: i64 },
    CartDec { product_id: i64 },
    CartRemove { product_id: i64 },
    CartClear,
    Checkout { deadline: u32, address: String },
    Orders { status: Option<String> },
    OrderShow { id: i64 },
    Accept { id: i64 },
    Reject { id: i64 },
    Edit { id: i64 },
    DraftShow,
    DraftAddress { address: String },
    DraftDeadline { days: u32 },
    DraftAdd { product_id: i64 },
    DraftInc { product_id: i64 },
    DraftDec { product_id: i64 },
    DraftRemove { product_id: i64 },
    DraftSave,
    DraftCancel,
    Dashboard,
    Users { role: Option<String> },
    Approve { id: i64 },
    SetRole { id: i64, role: Role },
    SetStatus { id: i64, status: UserStatus },
    ResetPassword { id: i64 },
    Assignments { employee_id: i64 },
    Assign { employee_id: i64, customer_ids: Vec<i64> },
    Unassign { employee_id: i64, customer_id: i64 },
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let head = words.next().ok_or("empty command")?;
    let rest: Vec<&str> = words.collect();

    fn id(rest: &[&str], index: usize) -> Result<i64, String> {
        rest.get(index)
            .ok_or("missing id")?
            .parse()
            .map_err(|_| format!("not a numeric id: {:?}", rest[index]))
    }

    match (head, rest.as_slice()) {
        ("help" | "?", _) => Ok(Command::Help),
        ("quit" | "exit", _) => Ok(Command::Quit),
        ("login", [username, password]) => Ok(Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        }),
        ("register", [username, password, rest @ ..]) => {
            let role = match rest {
                [] => Role::Customer,
                [role] => role.parse().map_err(|_| format!("unknown role {role:?}"))?,
                _ => return Err("usage: register <username> <password> [role]".to_string()),
            };
            Ok(Command::Register {
                username: username.to_string(),
                password: password.to_string(),
                role,
            })
        }
        ("logout", _) => Ok(Command::Logout),
        ("whoami", _) => Ok(Command::WhoAmI),
        ("products", rest) => Ok(Command::Products {
            search: (!rest.is_empty()).then(|| rest.join(" ")),
        }),
        ("product", ["add", name, price, stock]) => Ok(Command::ProductAdd {
            name: name.to_string(),
            price: price.parse().map_err(|_| format!("bad price {price:?}"))?,
            stock: stock.parse().map_err(|_| format!("bad stock {stock:?}"))?,
        }),
        ("product", ["stock", _, count]) => Ok(Command::ProductStock {
            id: id(&rest, 1)?,
            stock: count.parse().map_err(|_| format!("bad stock {count:?}"))?,
        }),
        ("product", ["drop", _]) => Ok(Command::ProductDrop { id: id(&rest, 1)? }),
        ("customers", _) => Ok(Command::Customers),
        ("customer", ["clear"]) => Ok(Command::CustomerClear),
        ("customer", [_]) => Ok(Command::CustomerSelect { id: id(&rest, 0)? }),
        ("cart", []) => Ok(Command::Cart),
        ("cart", ["add", _, rest2 @ ..]) => Ok(Command::CartAdd {
            product_id: id(&rest, 1)?,
            quantity: match rest2 {
                [] => 1,
                [quantity] => quantity
                    .parse()
                    .map_err(|_| format!("bad quantity {quantity:?}"))?,
                _ => return Err("usage: cart add <product> [qty]".to_string()),
            },
        }),
        ("cart", ["inc", _]) => Ok(Command::CartInc { product_id: id(&rest, 1)? }),
        ("cart", ["dec", _]) => Ok(Command::CartDec { product_id: id(&rest, 1)? }),
        ("cart", ["rm", _]) => Ok(Command::CartRemove { product_id: id(&rest, 1)? }),
        ("cart", ["clear"]) => Ok(Command::CartClear),
        ("checkout", [deadline, address @ ..]) if !address.is_empty() => Ok(Command::Checkout {
            deadline: deadline
                .parse()
                .map_err(|_| format!("bad deadline {deadline:?}"))?,
            address: address.join(" "),
        }),
        ("orders", []) => Ok(Command::Orders { status: None }),
        ("orders", [status]) => Ok(Command::Orders {
            status: Some(status.to_string()),
        }),
        ("order", [_]) => Ok(Command::OrderShow { id: id(&rest, 0)? }),
        ("accept", [_]) => Ok(Command::Accept { id: id(&rest, 0)? }),
        ("reject", [_]) => Ok(Command::Reject { id: id(&rest, 0)? }),
        ("edit", [_]) => Ok(Command::Edit { id: id(&rest, 0)? }),
        ("draft", ["show"]) | ("draft", []) => Ok(Command::DraftShow),
        ("draft", ["address", address @ ..]) if !address.is_empty() => Ok(Command::DraftAddress {
            address: address.join(" "),
        }),
        ("draft", ["deadline", days]) => Ok(Command::DraftDeadline {
            days: days.parse().map_err(|_| format!("bad deadline {days:?}"))?,
        }),
        ("draft", ["add", _]) => Ok(Command::DraftAdd { product_id: id(&rest, 1)? }),
        ("draft", ["inc", _]) => Ok(Command::DraftInc { product_id: id(&rest, 1)? }),
        ("draft", ["dec", _]) => Ok(Command::DraftDec { product_id: id(&rest, 1)? }),
        ("draft", ["rm", _]) => Ok(Command::DraftRemove { product_id: id(&rest, 1)? }),
        ("draft", ["save"]) => Ok(Command::DraftSave),
        ("draft", ["cancel"]) => Ok(Command::DraftCancel),
        ("dashboard", _) => Ok(Command::Dashboard),
        ("users", []) => Ok(Command::Users { role: None }),
        ("users", [role]) => Ok(Command::Users {
            role: Some(role.to_string()),
        }),
        ("approve", [_]) => Ok(Command::Approve { id: id(&rest, 0)? }),
        ("role", [_, role]) => Ok(Command::SetRole {
            id: id(&rest, 0)?,
            role: role.parse().map_err(|_| format!("unknown role {role:?}"))?,
        }),
        ("status", [_, status]) => Ok(Command::SetStatus {
            id: id(&rest, 0)?,
            status: status
                .parse()
                .map_err(|_| format!("unknown status {status:?}"))?,
        }),
        ("resetpw", [_]) => Ok(Command::ResetPassword { id: id(&rest, 0)? }),
        ("assignments", [_]) => Ok(Command::Assignments {
            employee_id: id(&rest, 0)?,
        }),
        ("assign", [_, customers @ ..]) if !customers.is_empty() => {
            let customer_ids = customers
                .iter()
                .map(|raw| raw.parse().map_err(|_| format!("bad customer id {raw:?}")))
                .collect::<Result<Vec<i64>, String>>()?;
            Ok(Command::Assign {
                employee_id: id(&rest, 0)?,
                customer_ids,
            })
        }
        ("unassign", [_, _]) => Ok(Command::Unassign {
            employee_id: id(&rest, 0)?,
            customer_id: id(&rest, 1)?,
        }),
        _ => Err(format!("unrecognized command {line:?}; try `help`")),
    }
}

const HELP: &str = "\
session     login <user> <pass> | register <user> <pass> [role] | logout | whoami
catalog     products [search] | product add <name> <price> <stock> | product stock <id> <n> | product drop <id>
cart        cart | cart add <product> [qty] | cart inc/dec/rm <product> | cart clear
            customers | customer <id> | customer clear | checkout <deadline-days> <address>
orders      orders [status] | order <id> | accept <id> | reject <id>
editing     edit <id> | draft [show] | draft address <..> | draft deadline <n>
            draft add/inc/dec/rm <product> | draft save | draft cancel
admin       dashboard | users [role] | approve <id> | role <id> <role> | status <id> <status>
            resetpw <id> | assignments <emp> | assign <emp> <cust..> | unassign <emp> <cust>
other       help | quit";

/// Runs the shell until EOF or `quit`.
pub async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let app = App::new(config).context("failed to assemble client")?;
    app.init().await;
    info!("console started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut draft: Option<OrderDraft> = None;

    loop {
        let prompt = match app.auth().current_user() {
            Some(user) => format!("{}@orderdesk> ", user.username),
            None => "orderdesk> ".to_string(),
        };
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        dispatch(&app, &mut draft, command).await;

        // A 401 anywhere marks the session dead; fall back to the login
        // prompt instead of letting every later command fail the same way.
        if app.session_state() == SessionState::Expired && app.auth().is_authenticated() {
            println!("session expired; please log in again");
            app.logout().await;
            draft = None;
        }
    }
    Ok(())
}

async fn dispatch(app: &App, draft: &mut Option<OrderDraft>, command: Command) {
    match command {
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
        Command::Login { username, password } => {
            match LoginPage::new(app).submit_login(&username, &password).await {
                Ok(user) => println!("logged in as {} ({})", user.username, user.role),
                Err(error) => println!("login failed: {error}"),
            }
        }
        Command::Register { username, password, role } => {
            let request = crate::model::RegisterRequest {
                username,
                password: password.clone(),
                password2: password,
                email: None,
                phone: None,
                address: None,
                role,
            };
            match LoginPage::new(app).submit_registration(request).await {
                Ok(response) => println!("{}", response.detail),
                Err(error) => println!("registration failed: {error}"),
            }
        }
        Command::Logout => {
            app.logout().await;
            *draft = None;
            println!("logged out");
        }
        Command::WhoAmI => match app.auth().current_user() {
            Some(user) => println!("{} ({})", user.username, user.role),
            None => println!("not logged in"),
        },
        Command::Products { search } => {
            let filter = ProductFilter {
                search,
                ..ProductFilter::default()
            };
            match ProductsPage::new(app).load(&filter).await {
                Ok(PageFlow::Page(view)) => {
                    for card in &view.products {
                        let product = &card.product;
                        println!(
                            "#{:<4} {:<24} {:>10}  stock {:>4}{}",
                            product.id,
                            product.name,
                            product.price,
                            product.stock,
                            if card.can_add_to_cart { "" } else { "  (unavailable)" },
                        );
                    }
                    if view.can_manage {
                        println!("(manager: product add/stock/drop available)");
                    }
                }
                Ok(PageFlow::Redirect(redirect)) => print_redirect(&redirect),
                Err(error) => println!("failed to load products: {error}"),
            }
        }
        Command::ProductAdd { name, price, stock } => {
            let payload = ProductPayload {
                name,
                price,
                stock,
                ..ProductPayload::default()
            };
            report(ProductsPage::new(app).create(&payload).await.map(|product| {
                format!("created product #{} {}", product.id, product.name)
            }));
        }
        Command::ProductStock { id, stock } => {
            report(ProductsPage::new(app).set_stock(id, stock).await.map(|product| {
                format!("product #{} stock now {}", product.id, product.stock)
            }));
        }
        Command::ProductDrop { id } => {
            report(ProductsPage::new(app).deactivate(id).await);
        }
        Command::Customers => match CartPage::new(app).selectable_customers().await {
            Ok(customers) => {
                for customer in customers {
                    println!("#{:<4} {}", customer.id, customer.username);
                }
            }
            Err(error) => println!("{error}"),
        },
        Command::CustomerSelect { id } => {
            let page = CartPage::new(app);
            let result = match page.selectable_customers().await {
                Ok(customers) => match customers.into_iter().find(|customer| customer.id == id) {
                    Some(customer) => {
                        let name = customer.username.clone();
                        page.select_customer(customer)
                            .await
                            .map(|_| format!("acting on behalf of {name}"))
                    }
                    None => Err(Error::NotFound(format!("no selectable customer #{id}"))),
                },
                Err(error) => Err(error),
            };
            report(result);
        }
        Command::CustomerClear => {
            report(CartPage::new(app).clear_customer().await.map(|_| "acting as yourself".to_string()));
        }
        Command::Cart => match CartPage::new(app).load().await {
            Ok(PageFlow::Page(view)) => print_cart(&view),
            Ok(PageFlow::Redirect(redirect)) => print_redirect(&redirect),
            Err(error) => println!("failed to load cart: {error}"),
        },
        Command::CartAdd { product_id, quantity } => {
            report(app.cart().add(product_id, quantity).await.map(|_| cart_total(app)));
        }
        Command::CartInc { product_id } => {
            report(CartPage::new(app).increment(product_id).await.map(|_| cart_total(app)));
        }
        Command::CartDec { product_id } => {
            report(CartPage::new(app).decrement(product_id).await.map(|_| cart_total(app)));
        }
        Command::CartRemove { product_id } => {
            report(CartPage::new(app).remove(product_id).await.map(|_| cart_total(app)));
        }
        Command::CartClear => {
            report(CartPage::new(app).clear().await.map(|_| "cart cleared".to_string()));
        }
        Command::Checkout { deadline, address } => {
            match CartPage::new(app).checkout(&address, deadline).await {
                Ok(order) => println!(
                    "order #{} placed: {} due in {} days",
                    order.id, order.total_amount, order.payment_deadline
                ),
                Err(error) => println!("checkout blocked: {error}"),
            }
        }
        Command::Orders { status } => {
            let status = match status {
                Some(raw) => match raw.parse() {
                    Ok(status) => Some(status),
                    Err(_) => {
                        println!("unknown status {raw:?}");
                        return;
                    }
                },
                None => None,
            };
            let filter = OrderFilter {
                status,
                ..OrderFilter::default()
            };
            match OrdersPage::new(app).load(&filter).await {
                Ok(PageFlow::Page(view)) => {
                    for row in &view.orders {
                        println!(
                            "#{:<4} {:<12} {:<10} {:>10}  {}",
                            row.order.id,
                            row.order.username,
                            row.order.status,
                            row.order.total_amount,
                            row.deadline_label,
                        );
                    }
                }
                Ok(PageFlow::Redirect(redirect)) => print_redirect(&redirect),
                Err(error) => println!("failed to load orders: {error}"),
            }
        }
        Command::OrderShow { id } => match app.api().get_order(id).await {
            Ok(order) => print_order(&order),
            Err(error) => println!("{error}"),
        },
        Command::Accept { id } => {
            report(OrdersPage::new(app).accept(id).await.map(|order| {
                format!("order #{} is now {}", order.id, order.status)
            }));
        }
        Command::Reject { id } => {
            report(OrdersPage::new(app).reject(id).await.map(|order| {
                format!("order #{} is now {}", order.id, order.status)
            }));
        }
        Command::Edit { id } => match EditOrderPage::new(app).load(id).await {
            Ok(PageFlow::Page(loaded)) => {
                print_draft(&loaded);
                *draft = Some(loaded);
            }
            Ok(PageFlow::Redirect(redirect)) => print_redirect(&redirect),
            Err(error) => println!("failed to load order: {error}"),
        },
        Command::DraftShow => match draft {
            Some(draft) => print_draft(draft),
            None => println!("no order being edited; use `edit <id>`"),
        },
        Command::DraftAddress { address } => with_draft(draft, |draft| {
            draft.set_address(address);
            Ok(())
        }),
        Command::DraftDeadline { days } => with_draft(draft, |draft| {
            draft.set_deadline(days);
            Ok(())
        }),
        Command::DraftAdd { product_id } => with_draft(draft, |draft| draft.add_product(product_id)),
        Command::DraftInc { product_id } => with_draft(draft, |draft| draft.increment(product_id)),
        Command::DraftDec { product_id } => with_draft(draft, |draft| draft.decrement(product_id)),
        Command::DraftRemove { product_id } => with_draft(draft, |draft| draft.remove(product_id)),
        Command::DraftSave => match draft.take() {
            Some(current) => match EditOrderPage::new(app).save(&current).await {
                Ok(order) => {
                    println!("order #{} saved, total {}", order.id, order.total_amount);
                }
                Err(error) => {
                    println!("save failed: {error}");
                    *draft = Some(current);
                }
            },
            None => println!("no order being edited; use `edit <id>`"),
        },
        Command::DraftCancel => {
            *draft = None;
            println!("edit discarded");
        }
        Command::Dashboard => match DashboardPage::new(app).load().await {
            Ok(PageFlow::Page(view)) => {
                println!(
                    "orders: {} totalling {}, {} pending",
                    view.order_summary.count, view.order_summary.total, view.order_summary.pending
                );
                if let Some(stats) = view.product_stats {
                    println!(
                        "products: {} total, {} low stock, {} out of stock",
                        stats.total_products, stats.low_stock_products, stats.out_of_stock
                    );
                }
                if let Some(stats) = view.user_stats {
                    println!(
                        "users: {} total, {} awaiting approval",
                        stats.total_users, stats.pending_approval
                    );
                }
                if let Some(low) = view.low_stock {
                    for product in low {
                        println!("low stock: #{} {} ({})", product.id, product.name, product.stock);
                    }
                }
            }
            Ok(PageFlow::Redirect(redirect)) => print_redirect(&redirect),
            Err(error) => println!("failed to load dashboard: {error}"),
        },
        Command::Users { role } => {
            let role = match role {
                Some(raw) => match raw.parse() {
                    Ok(role) => Some(role),
                    Err(_) => {
                        println!("unknown role {raw:?}");
                        return;
                    }
                },
                None => None,
            };
            let filter = UserAdminFilter {
                role,
                ..UserAdminFilter::default()
            };
            match UserManagementPage::new(app).load(&filter).await {
                Ok(PageFlow::Page(view)) => {
                    for row in &view.users {
                        let user = &row.user;
                        println!(
                            "#{:<4} {:<16} {:<9} {}{}",
                            user.id,
                            user.username,
                            user.role,
                            user.status.map(|status| status.to_string()).unwrap_or_default(),
                            if row.can_approve { "  (approve available)" } else { "" },
                        );
                    }
                }
                Ok(PageFlow::Redirect(redirect)) => print_redirect(&redirect),
                Err(error) => println!("failed to load users: {error}"),
            }
        }
        Command::Approve { id } => {
            report(UserManagementPage::new(app).approve(id).await.map(|user| {
                format!("{} is now {}", user.username, user.status.map(|s| s.to_string()).unwrap_or_default())
            }));
        }
        Command::SetRole { id, role } => {
            report(UserManagementPage::new(app).set_role(id, role).await.map(|user| {
                format!("{} is now {}", user.username, user.role)
            }));
        }
        Command::SetStatus { id, status } => {
            report(UserManagementPage::new(app).set_status(id, status).await.map(|user| {
                format!("{} is now {}", user.username, user.status.map(|s| s.to_string()).unwrap_or_default())
            }));
        }
        Command::ResetPassword { id } => {
            report(UserManagementPage::new(app).reset_password(id).await.map(|response| {
                format!("{} (temporary password: {})", response.message, response.temp_password)
            }));
        }
        Command::Assignments { employee_id } => {
            match UserManagementPage::new(app).assignments(employee_id).await {
                Ok(panel) => {
                    for assignment in &panel.assigned {
                        println!("assigned: #{} {}", assignment.customer.id, assignment.customer.username);
                    }
                    for customer in &panel.unassigned {
                        println!("unassigned: #{} {}", customer.id, customer.username);
                    }
                }
                Err(error) => println!("{error}"),
            }
        }
        Command::Assign { employee_id, customer_ids } => {
            report(
                UserManagementPage::new(app)
                    .assign(employee_id, &customer_ids)
                    .await
                    .map(|_| "customers assigned".to_string()),
            );
        }
        Command::Unassign { employee_id, customer_id } => {
            report(
                UserManagementPage::new(app)
                    .unassign(employee_id, customer_id)
                    .await
                    .map(|_| "customer unassigned".to_string()),
            );
        }
    }
}

fn with_draft(draft: &mut Option<OrderDraft>, apply: impl FnOnce(&mut OrderDraft) -> crate::error::Result<()>) {
    match draft {
        Some(draft) => match apply(draft) {
            Ok(()) => print_draft(draft),
            Err(error) => println!("{error}"),
        },
        None => println!("no order being edited; use `edit <id>`"),
    }
}

fn report(result: crate::error::Result<String>) {
    match result {
        Ok(message) => println!("{message}"),
        Err(error) => println!("{error}"),
    }
}

fn cart_total(app: &App) -> String {
    format!("cart total {}", app.cart().snapshot().total)
}

fn print_redirect(redirect: &Redirect) {
    if let Some(notice) = &redirect.notice {
        println!("{notice}");
    }
    match redirect.to {
        Route::Login => println!("please log in first"),
        _ => {}
    }
}

fn print_cart(view: &CartView) {
    if let Some(customer) = &view.acting_customer {
        println!("acting on behalf of {}", customer.username);
    }
    for line in &view.lines {
        println!(
            "#{:<4} {:<24} x{:<3} {:>10}{}",
            line.item.product.id,
            line.item.product.name,
            line.item.quantity,
            line.item.total,
            if line.can_increment { "" } else { "  (at stock limit)" },
        );
    }
    println!("total {}", view.total);
}

fn print_order(order: &Order) {
    println!(
        "order #{} for {}: {} ({})",
        order.id, order.username, order.total_amount, order.status
    );
    for item in &order.items {
        println!(
            "  {:<24} x{:<3} @ {}",
            item.product_detail.name, item.quantity, item.price
        );
    }
    println!("  ship to: {}", order.shipping_address);
    if let Some(state) = &order.location_state {
        println!("  placed from: {state}");
    }
}

fn print_draft(draft: &OrderDraft) {
    println!(
        "editing order #{}: ship to {}, due in {} days",
        draft.order_id(),
        draft.shipping_address,
        draft.payment_deadline
    );
    for line in draft.lines() {
        println!(
            "  #{:<4} {:<24} x{:<3} @ {}",
            line.product_id, line.name, line.quantity, line.price
        );
    }
    println!("  preview total {}", draft.preview_total());
}
