use insta::assert_snapshot;
use sqm::domain::fixtures::shop_model;
use sqm::interpret::{interpret, InterpretOptions};
use sqm::sqm::render;

fn rendered(source: &str) -> String {
    let statement = interpret(source, &shop_model(), InterpretOptions::default())
        .unwrap_or_else(|e| panic!("'{}' should interpret: {}", source, e));
    render(&statement)
}

#[test]
fn test_render_explicit_join_and_parameter() {
    assert_snapshot!(
        rendered("select o.number from Order o join o.customer c where c.name = :name"),
        @r"
    select statement
      query #0
        from
          root Order as o
          inner join o.customer -> Customer as c
        select
          path o.number : string
        where
          =
            path c.name : string
            parameter :name : string
    "
    );
}

#[test]
fn test_render_implicit_join_grouping_and_ordering() {
    assert_snapshot!(
        rendered(
            "select o.status, count(*) from Order o where o.customer.name like 'A%' group by o.status order by o.status desc"
        ),
        @r"
    select statement
      query #0
        from
          root Order as o
          implicit inner join o.customer -> Customer as Customer#1
        select
          path o.status : string
          count(*) : long
        where
          like
            path o.customer.name : string
            literal 'A%' : string
        group by
          path o.status : string
        order desc
          path o.status : string
    "
    );
}

#[test]
fn test_render_correlated_subquery() {
    assert_snapshot!(
        rendered(
            "select o from Order o where o.status in ('NEW', 'PAID') and not exists (select l from OrderLine l where l.order = o)"
        ),
        @r"
    select statement
      query #0
        from
          root Order as o
        select
          element o : Order
        where
          and
            in
              path o.status : string
              literal 'NEW' : string
              literal 'PAID' : string
            not
              exists
                subquery
                  query #72
                    from
                      root OrderLine as l
                      implicit inner join l.order -> Order as Order#2
                    select
                      element l : OrderLine
                    where
                      =
                        path l.order : Order
                        element o : Order
    "
    );
}

#[test]
fn test_render_update() {
    assert_snapshot!(
        rendered("update Customer c set c.name = :name where c.id = 1"),
        @r"
    update statement
      root Customer as c
      set
        =
          path c.name : string
          parameter :name : string
      where
        =
          path c.id : long
          literal 1 : integer
    "
    );
}

#[test]
fn test_render_delete_with_generated_label() {
    assert_snapshot!(
        rendered("delete from Customer where name = :n"),
        @r"
    delete statement
      root Customer as Customer#0
      where
        =
          path Customer#0.name : string
          parameter :n : string
    "
    );
}

#[test]
fn test_render_insert_select() {
    assert_snapshot!(
        rendered("insert into Customer (name) select p.name from Product p"),
        @r"
    insert statement
      root Customer as Customer#0
      state fields
        path Customer#0.name : string
      query #28
        from
          root Product as p
        select
          path p.name : string
    "
    );
}
